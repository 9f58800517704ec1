//! Control protocol between the external controller and the scanner

use crate::export::ExportSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Idle,
    Passive,
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    StartPassive,
    /// Autoscroll for `duration` seconds, then stop and export
    StartAuto { duration: u64 },
    StopAndExport,
    GetStatus,
    ClearCache,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub is_scanning: bool,
    pub mode: ScanMode,
    pub post_count: usize,
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    Started { success: bool, mode: ScanMode },

    #[serde(rename_all = "camelCase")]
    Exported { success: bool, data: ExportSnapshot },

    Status(ScanStatus),

    #[serde(rename_all = "camelCase")]
    Cleared { success: bool, post_count: usize },
}
