use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::test_helpers::RecordingApi;
use crate::types::{TaskRecord, TaskState};
use serde_json::json;
use std::sync::Arc;
