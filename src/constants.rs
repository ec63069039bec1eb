//! Grammar patterns, storage names and defaults

// Flag grammar: path (segments with optional trailing `.*`, or a bare `*`)
// followed by up to two `:uint` suffixes (cooldown seconds, usage limit).
pub const FLAG_PATTERN: &str =
    r"^(?:(?:[a-z0-9]+|\?)(?:\.(?:[a-z0-9]+|\?))*(?:\.\*)?|\*)(?::[0-9]+){0,2}$";
pub const STRICT_FLAG_PATTERN: &str = r"^[a-z0-9]+(?:\.[a-z0-9]+)*$";
pub const OBJECT_ID_PATTERN: &str = r"^[a-f0-9]{24}$";
pub const DISCORD_ID_PATTERN: &str = r"^[0-9]{16,20}$";

// Flag syntax
pub const SEGMENT_SEPARATOR: char = '.';
pub const SUFFIX_SEPARATOR: char = ':';
pub const WILDCARD: &str = "*";
pub const ANY_SEGMENT: &str = "?";

// LMDB sub-databases
pub const DB_HOLDERS: &str = "holders";
pub const DB_STATES: &str = "states";
pub const DB_DEFINITIONS: &str = "definitions";

// Store defaults
pub const DEFAULT_DB_PATH: &str = "./data/flagperm.mdb";
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_MAX_DBS: u32 = 8;

// Environment overrides for StoreConfig::from_env
pub const ENV_DB_PATH: &str = "FLAGPERM_DB";
pub const ENV_MAP_SIZE: &str = "FLAGPERM_MAP_SIZE";

// Milliseconds per cooldown second
pub const MILLIS_PER_SECOND: u64 = 1000;
