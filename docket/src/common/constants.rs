// doc constants
pub const DOC_ID: &str = "_id";
pub const DOC_TYPE: &str = "_doc_type";
pub const PK_ALIAS: &str = "pk";
pub const RESERVED_ATTRS: [&str; 2] = [DOC_ID, DOC_TYPE];

// id minting constants
pub const MINT_DATE_ATTR: &str = "_date";
pub const MINT_UUID_ATTR: &str = "_uuid";
pub const ID_HASH_LEN: usize = 10;
pub const ID_SEGMENT: &str = "id";
pub const ID_SEPARATOR: &str = ":";

// index constants
pub const DEFAULT_INDEX_SUFFIX: &str = "-index";
pub const INDEX_SEGMENT: &str = "indexes";
pub const MODEL_SET_SUFFIX: &str = "all";

// storage type tags
pub const TYPE_TAG_STRING: &str = "S";
pub const TYPE_TAG_NUMBER: &str = "N";

// condition suffix separator in filter keys, e.g. "gpa__between"
pub const CONDITION_SEPARATOR: &str = "__";

pub const DOCKET_VERSION: &str = env!("CARGO_PKG_VERSION");
