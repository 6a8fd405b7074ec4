//! Utility functions for display formatting and Toronto-time conversion.

pub mod format;
pub mod timezone;

// Re-export commonly used functions at module level
pub use format::{capitalize, format_field_name, format_field_value, format_file_size, truncate_string};
