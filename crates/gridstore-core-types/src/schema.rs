//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Routing identifiers
pub const FIELD_GRID_ID: &str = "grid_id";
pub const FIELD_LAYER_ID: &str = "layer_id";
pub const FIELD_EDIT_MODE: &str = "edit_mode";

// Edit identifiers
pub const FIELD_OBJECT_ID: &str = "object_id";
pub const FIELD_BATCH_ID: &str = "batch_id";
pub const FIELD_FILTER_ID: &str = "filter_id";

// Collection sizes
pub const FIELD_HISTORY_LEN: &str = "history_len";
pub const FIELD_HISTORY_INDEX: &str = "history_index";
pub const FIELD_APPLIED_LEN: &str = "applied_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!FIELD_GRID_ID.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_routing_fields_are_distinct() {
        assert_ne!(FIELD_GRID_ID, FIELD_LAYER_ID);
        assert_ne!(FIELD_LAYER_ID, FIELD_OBJECT_ID);
    }
}
