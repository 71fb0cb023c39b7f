//! Exit codes of the resource
//!
//! Every terminal failure has its own code so pipeline logs can tell them
//! apart. All values fit in the 8 bits a Unix exit status keeps.

/// Success - chart published and verified
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Input envelope is not valid JSON or misses required fields
pub const MALFORMED_INPUT: i32 = 10;

/// version_file named but unusable, and no version given
pub const MISSING_VERSION: i32 = 11;

/// Requested version outside source.version_range
pub const VERSION_RANGE: i32 = 12;

/// Chart directory or Chart.yaml missing or unreadable
pub const CHART_NOT_FOUND: i32 = 13;

/// repo add, dependency build or package failed
pub const PACKAGE_ERROR: i32 = 20;

/// Packaged chart could not be inspected
pub const INSPECT_ERROR: i32 = 21;

/// sign requested without exactly one of key_data/key_file
pub const SIGNING_CONFIG: i32 = 30;

/// gpg import or export failed
pub const SIGNING_IMPORT: i32 = 31;

/// gpg succeeded but no key id could be read from its output
pub const SIGNING_KEY_ID: i32 = 32;

/// Registry could not be reached
pub const REGISTRY_UNREACHABLE: i32 = 40;

/// Upload answered with a status other than 201
pub const UPLOAD_REJECTED: i32 = 41;

/// Upload answered with an error in the body
pub const UPLOAD_ERROR: i32 = 42;

/// Upload answered without saved=true
pub const UPLOAD_NOT_SAVED: i32 = 43;

/// Registry serves another version than the one uploaded
pub const VERSION_MISMATCH: i32 = 50;

/// Uploaded chart never showed up in the index
pub const NOT_INDEXED: i32 = 51;

/// Downloaded archive does not match the expected digest
pub const INTEGRITY_ERROR: i32 = 52;

/// Version asked for by `in` is not in the registry
pub const VERSION_NOT_FOUND: i32 = 53;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
