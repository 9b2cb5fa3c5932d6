//! Column family definitions for the RocksDB ticket store
//!
//! Tickets and their side collections share one RocksDB instance. Side
//! collection keys embed a zero-padded timestamp so a prefix scan returns
//! them in creation order.

/// Column family for ticket documents
pub const CF_TICKETS: &str = "tickets";

/// Column family for resolution records
pub const CF_RESOLUTIONS: &str = "resolutions";

/// Column family for ticket comments
pub const CF_COMMENTS: &str = "comments";

/// All column family names
pub const ALL_CFS: &[&str] = &[CF_TICKETS, CF_RESOLUTIONS, CF_COMMENTS];

/// Key prefixes for compound keys
pub mod keys {
    /// Prefix shared by every ticket key
    pub const TICKET_PREFIX: &str = "ticket:";

    pub fn ticket(ticket_id: &str) -> String {
        format!("ticket:{}", ticket_id)
    }

    /// Prefix of all resolutions for a ticket
    pub fn resolution_prefix(ticket_id: &str) -> String {
        format!("resolution:{}:", ticket_id)
    }

    pub fn resolution(ticket_id: &str, timestamp_nanos: i64, resolution_id: &str) -> String {
        format!(
            "resolution:{}:{:020}:{}",
            ticket_id, timestamp_nanos, resolution_id
        )
    }

    /// Prefix of all comments for a ticket
    pub fn comment_prefix(ticket_id: &str) -> String {
        format!("comment:{}:", ticket_id)
    }

    pub fn comment(ticket_id: &str, timestamp_nanos: i64, comment_id: &str) -> String {
        format!("comment:{}:{:020}:{}", ticket_id, timestamp_nanos, comment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        assert_eq!(keys::ticket("abc123"), "ticket:abc123");
        assert!(keys::ticket("abc123").starts_with(keys::TICKET_PREFIX));
        assert_eq!(
            keys::comment("t-1", 42, "c-1"),
            "comment:t-1:00000000000000000042:c-1"
        );
        assert!(keys::resolution("t-1", 7, "r-1").starts_with(&keys::resolution_prefix("t-1")));
    }

    #[test]
    fn test_side_collection_key_ordering() {
        let key1 = keys::comment("t-1", 1_000_000_000, "z");
        let key2 = keys::comment("t-1", 2_000_000_000, "a");
        assert!(key1 < key2);
    }

    #[test]
    fn test_prefix_does_not_overlap_similar_ids() {
        // "t-1:" must not match keys of "t-10"
        let other = keys::comment("t-10", 1, "c");
        assert!(!other.starts_with(&keys::comment_prefix("t-1")));
    }
}
