//! Error catalog for rcsum.
//!
//! | Range      | Category     | Description                              |
//! |------------|--------------|------------------------------------------|
//! | E001-E099  | Config       | Configuration file and environment       |
//! | E100-E199  | Execution    | Host binary and adb command execution    |
//! | E200-E299  | Transfer     | Pushing files and device temp files      |
//! | E300-E399  | Verification | Checksum results and comparisons         |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
