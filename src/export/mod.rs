// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! The export engine: plans the destination layout from the library,
//! reconciles the destination tree against the plan, and exports files.

mod dir;
mod exporter;
mod stage_1_plan;
mod stage_2_scan;
mod stage_3_generate;

pub use dir::{ExportDir, ExportFile};
pub use exporter::{ExportStats, Exporter};

#[cfg(test)]
mod testing;
