//! Firebird wire protocol constants
//!
//! Operation codes, ISC status codes and the tag values used inside the
//! various parameter and information buffers exchanged with the server.

// =============================================================================
// Protocol Versions
// =============================================================================

/// Protocol negotiation values
#[allow(missing_docs)]
pub mod protocol {
    pub const CONNECT_VERSION2: i32 = 2;
    pub const ARCH_GENERIC: i32 = 1;

    pub const PTYPE_RPC: i32 = 2;
    pub const PTYPE_BATCH_SEND: i32 = 3;
    pub const PTYPE_OUT_OF_BAND: i32 = 4;
    pub const PTYPE_LAZY_SEND: i32 = 5;
    pub const PTYPE_MASK: i32 = 0xFF;

    pub const FB_PROTOCOL_FLAG: i32 = 0x8000;
    pub const FB_PROTOCOL_MASK: i32 = !FB_PROTOCOL_FLAG & 0xFFFF;

    pub const PROTOCOL_VERSION10: i32 = 10;
    pub const PROTOCOL_VERSION11: i32 = FB_PROTOCOL_FLAG | 11;
    pub const PROTOCOL_VERSION12: i32 = FB_PROTOCOL_FLAG | 12;
    pub const PROTOCOL_VERSION13: i32 = FB_PROTOCOL_FLAG | 13;

    /// User identification tags carried in `op_connect`
    pub const CNCT_USER: u8 = 1;
    pub const CNCT_PASSWD: u8 = 2;
    pub const CNCT_HOST: u8 = 4;
    pub const CNCT_GROUP: u8 = 5;
    pub const CNCT_USER_VERIFICATION: u8 = 6;

    /// Asynchronous connection request type
    pub const P_REQ_ASYNC: i32 = 1;
}

// =============================================================================
// Operation Codes
// =============================================================================

/// Wire operation codes
#[allow(missing_docs)]
pub mod op {
    pub const VOID: i32 = 0;
    pub const CONNECT: i32 = 1;
    pub const EXIT: i32 = 2;
    pub const ACCEPT: i32 = 3;
    pub const REJECT: i32 = 4;
    pub const DISCONNECT: i32 = 6;
    pub const RESPONSE: i32 = 9;

    pub const ATTACH: i32 = 19;
    pub const CREATE: i32 = 20;
    pub const DETACH: i32 = 21;

    pub const TRANSACTION: i32 = 29;
    pub const COMMIT: i32 = 30;
    pub const ROLLBACK: i32 = 31;
    pub const PREPARE: i32 = 32;

    pub const CREATE_BLOB: i32 = 34;
    pub const OPEN_BLOB: i32 = 35;
    pub const GET_SEGMENT: i32 = 36;
    pub const PUT_SEGMENT: i32 = 37;
    pub const CANCEL_BLOB: i32 = 38;
    pub const CLOSE_BLOB: i32 = 39;

    pub const INFO_DATABASE: i32 = 40;
    pub const INFO_TRANSACTION: i32 = 42;
    pub const INFO_BLOB: i32 = 43;
    pub const BATCH_SEGMENTS: i32 = 44;

    pub const QUE_EVENTS: i32 = 48;
    pub const CANCEL_EVENTS: i32 = 49;
    pub const COMMIT_RETAINING: i32 = 50;
    pub const PREPARE2: i32 = 51;
    pub const EVENT: i32 = 52;
    pub const CONNECT_REQUEST: i32 = 53;

    pub const OPEN_BLOB2: i32 = 56;
    pub const CREATE_BLOB2: i32 = 57;
    pub const GET_SLICE: i32 = 58;
    pub const PUT_SLICE: i32 = 59;
    pub const SLICE: i32 = 60;

    pub const ALLOCATE_STATEMENT: i32 = 62;
    pub const EXECUTE: i32 = 63;
    pub const EXEC_IMMEDIATE: i32 = 64;
    pub const FETCH: i32 = 65;
    pub const FETCH_RESPONSE: i32 = 66;
    pub const FREE_STATEMENT: i32 = 67;
    pub const PREPARE_STATEMENT: i32 = 68;
    pub const SET_CURSOR: i32 = 69;
    pub const INFO_SQL: i32 = 70;
    pub const DUMMY: i32 = 71;

    pub const EXECUTE2: i32 = 76;
    pub const SQL_RESPONSE: i32 = 78;

    pub const DROP_DATABASE: i32 = 81;
    pub const SERVICE_ATTACH: i32 = 82;
    pub const SERVICE_DETACH: i32 = 83;
    pub const SERVICE_INFO: i32 = 84;
    pub const SERVICE_START: i32 = 85;
    pub const ROLLBACK_RETAINING: i32 = 86;

    pub const CANCEL: i32 = 91;
    pub const PING: i32 = 93;
}

// =============================================================================
// Status Vector Arguments
// =============================================================================

/// Tags found in a status vector
#[allow(missing_docs)]
pub mod isc_arg {
    pub const END: i32 = 0;
    pub const GDS: i32 = 1;
    pub const STRING: i32 = 2;
    pub const CSTRING: i32 = 3;
    pub const NUMBER: i32 = 4;
    pub const INTERPRETED: i32 = 5;
    pub const VMS: i32 = 6;
    pub const UNIX: i32 = 7;
    pub const DOMAIN: i32 = 8;
    pub const DOS: i32 = 9;
    pub const WIN32: i32 = 17;
    pub const WARNING: i32 = 18;
    pub const SQL_STATE: i32 = 19;
}

// =============================================================================
// ISC Error Codes
// =============================================================================

/// ISC status codes raised by the server or by the client itself
#[allow(missing_docs)]
pub mod isc {
    pub const ARITH_EXCEPT: i32 = 335544321;
    pub const BAD_DB_HANDLE: i32 = 335544324;
    pub const BAD_REQ_HANDLE: i32 = 335544327;
    pub const BAD_TRANS_HANDLE: i32 = 335544332;
    pub const BAD_STMT_HANDLE: i32 = 335544485;
    pub const OPEN_TRANS: i32 = 335544357;
    pub const SEGMENT: i32 = 335544366;
    pub const SEGSTR_EOF: i32 = 335544367;
    pub const CONNECT_REJECT: i32 = 335544421;
    pub const INVALID_DIMENSION: i32 = 335544458;
    pub const TRA_STATE: i32 = 335544468;
    pub const DSQL_SQLDA_ERR: i32 = 335544583;
    pub const NETWORK_ERROR: i32 = 335544721;
    pub const NET_READ_ERR: i32 = 335544726;
    pub const NET_WRITE_ERR: i32 = 335544727;
    pub const STRING_TRUNCATION: i32 = 335544914;
    pub const NOTHING_TO_CANCEL: i32 = 335544933;
    pub const CANCELLED: i32 = 335544794;
    pub const LOGIN: i32 = 335544472;
    pub const UNAVAILABLE: i32 = 335544375;
}

// =============================================================================
// Parameter Buffers
// =============================================================================

/// Database parameter buffer (DPB) tags
#[allow(missing_docs)]
pub mod dpb {
    pub const VERSION1: u8 = 1;
    pub const PAGE_SIZE: u8 = 4;
    pub const NUM_BUFFERS: u8 = 5;
    pub const DUMMY_PACKET_INTERVAL: u8 = 58;
    pub const USER_NAME: u8 = 28;
    pub const PASSWORD: u8 = 29;
    pub const LC_CTYPE: u8 = 48;
    pub const CONNECT_TIMEOUT: u8 = 57;
    pub const SQL_ROLE_NAME: u8 = 60;
    pub const SQL_DIALECT: u8 = 63;
    pub const SET_DB_CHARSET: u8 = 68;
    pub const PROCESS_ID: u8 = 71;
    pub const PROCESS_NAME: u8 = 74;
}

/// Transaction parameter buffer (TPB) tags
#[allow(missing_docs)]
pub mod tpb {
    pub const VERSION3: u8 = 3;
    pub const CONSISTENCY: u8 = 1;
    pub const CONCURRENCY: u8 = 2;
    pub const SHARED: u8 = 3;
    pub const PROTECTED: u8 = 4;
    pub const EXCLUSIVE: u8 = 5;
    pub const WAIT: u8 = 6;
    pub const NOWAIT: u8 = 7;
    pub const READ: u8 = 8;
    pub const WRITE: u8 = 9;
    pub const LOCK_READ: u8 = 10;
    pub const LOCK_WRITE: u8 = 11;
    pub const VERB_TIME: u8 = 12;
    pub const COMMIT_TIME: u8 = 13;
    pub const IGNORE_LIMBO: u8 = 14;
    pub const READ_COMMITTED: u8 = 15;
    pub const AUTOCOMMIT: u8 = 16;
    pub const REC_VERSION: u8 = 17;
    pub const NO_REC_VERSION: u8 = 18;
    pub const RESTART_REQUESTS: u8 = 19;
    pub const NO_AUTO_UNDO: u8 = 20;
    pub const LOCK_TIMEOUT: u8 = 21;
}

/// Blob parameter buffer (BPB) tags
#[allow(missing_docs)]
pub mod bpb {
    pub const VERSION1: u8 = 1;
    pub const SOURCE_TYPE: u8 = 1;
    pub const TARGET_TYPE: u8 = 2;
    pub const TYPE: u8 = 3;
    pub const SOURCE_INTERP: u8 = 4;
    pub const TARGET_INTERP: u8 = 5;

    pub const TYPE_SEGMENTED: u8 = 0;
    pub const TYPE_STREAM: u8 = 1;
}

/// Event parameter buffer (EPB) tags
#[allow(missing_docs)]
pub mod epb {
    pub const VERSION1: u8 = 1;
}

/// Service parameter buffer (SPB) tags and service actions
#[allow(missing_docs)]
pub mod spb {
    pub const VERSION2: u8 = 2;
    pub const CURRENT_VERSION: u8 = 2;

    pub const USER_NAME: u8 = 28;
    pub const PASSWORD: u8 = 29;
    pub const COMMAND_LINE: u8 = 105;
    pub const DBNAME: u8 = 106;
    pub const VERBOSE: u8 = 107;
    pub const OPTIONS: u8 = 108;

    pub const ACTION_BACKUP: u8 = 1;
    pub const ACTION_RESTORE: u8 = 2;
    pub const ACTION_REPAIR: u8 = 3;
    pub const ACTION_ADD_USER: u8 = 4;
    pub const ACTION_DELETE_USER: u8 = 5;
    pub const ACTION_MODIFY_USER: u8 = 6;
    pub const ACTION_DISPLAY_USER: u8 = 7;
    pub const ACTION_PROPERTIES: u8 = 8;
    pub const ACTION_DB_STATS: u8 = 11;
    pub const ACTION_GET_FB_LOG: u8 = 12;

    pub const BKP_FILE: u8 = 5;
    pub const BKP_FACTOR: u8 = 6;
    pub const BKP_LENGTH: u8 = 7;

    pub const BKP_IGNORE_CHECKSUMS: i32 = 0x01;
    pub const BKP_IGNORE_LIMBO: i32 = 0x02;
    pub const BKP_METADATA_ONLY: i32 = 0x04;
    pub const BKP_NO_GARBAGE_COLLECT: i32 = 0x08;
    pub const BKP_OLD_DESCRIPTIONS: i32 = 0x10;
    pub const BKP_NON_TRANSPORTABLE: i32 = 0x20;
    pub const BKP_CONVERT: i32 = 0x40;

    pub const RES_BUFFERS: u8 = 9;
    pub const RES_PAGE_SIZE: u8 = 10;
    pub const RES_LENGTH: u8 = 11;
    pub const RES_ACCESS_MODE: u8 = 12;

    pub const RES_DEACTIVATE_IDX: i32 = 0x0100;
    pub const RES_NO_SHADOW: i32 = 0x0200;
    pub const RES_NO_VALIDITY: i32 = 0x0400;
    pub const RES_ONE_AT_A_TIME: i32 = 0x0800;
    pub const RES_REPLACE: i32 = 0x1000;
    pub const RES_CREATE: i32 = 0x2000;
    pub const RES_USE_ALL_SPACE: i32 = 0x4000;

    pub const SEC_USERID: u8 = 5;
    pub const SEC_GROUPID: u8 = 6;
    pub const SEC_USERNAME: u8 = 7;
    pub const SEC_PASSWORD: u8 = 8;
    pub const SEC_GROUPNAME: u8 = 9;
    pub const SEC_FIRSTNAME: u8 = 10;
    pub const SEC_MIDDLENAME: u8 = 11;
    pub const SEC_LASTNAME: u8 = 12;

    pub const PRP_PAGE_BUFFERS: u8 = 5;
    pub const PRP_SWEEP_INTERVAL: u8 = 6;
    pub const PRP_RESERVE_SPACE: u8 = 11;
    pub const PRP_WRITE_MODE: u8 = 12;
    pub const PRP_ACCESS_MODE: u8 = 13;
    pub const PRP_SET_SQL_DIALECT: u8 = 14;

    pub const STS_DATA_PAGES: i32 = 0x01;
    pub const STS_DB_LOG: i32 = 0x02;
    pub const STS_HDR_PAGES: i32 = 0x04;
    pub const STS_IDX_PAGES: i32 = 0x08;
    pub const STS_SYS_RELATIONS: i32 = 0x10;
}

// =============================================================================
// Information Items
// =============================================================================

/// Generic information buffer markers
#[allow(missing_docs)]
pub mod info {
    pub const END: u8 = 1;
    pub const TRUNCATED: u8 = 2;
    pub const ERROR: u8 = 3;
    pub const DATA_NOT_READY: u8 = 4;
}

/// Database information items (`op_info_database`)
#[allow(missing_docs)]
pub mod db_info {
    pub const DB_ID: u8 = 4;
    pub const READS: u8 = 5;
    pub const WRITES: u8 = 6;
    pub const FETCHES: u8 = 7;
    pub const MARKS: u8 = 8;
    pub const IMPLEMENTATION: u8 = 11;
    pub const ISC_VERSION: u8 = 12;
    pub const BASE_LEVEL: u8 = 13;
    pub const PAGE_SIZE: u8 = 14;
    pub const NUM_BUFFERS: u8 = 15;
    pub const LIMBO: u8 = 16;
    pub const CURRENT_MEMORY: u8 = 17;
    pub const MAX_MEMORY: u8 = 18;
    pub const WINDOW_TURNS: u8 = 19;
    pub const LICENSE: u8 = 20;
    pub const ALLOCATION: u8 = 21;
    pub const ATTACHMENT_ID: u8 = 22;
    pub const READ_SEQ_COUNT: u8 = 23;
    pub const READ_IDX_COUNT: u8 = 24;
    pub const INSERT_COUNT: u8 = 25;
    pub const UPDATE_COUNT: u8 = 26;
    pub const DELETE_COUNT: u8 = 27;
    pub const BACKOUT_COUNT: u8 = 28;
    pub const PURGE_COUNT: u8 = 29;
    pub const EXPUNGE_COUNT: u8 = 30;
    pub const SWEEP_INTERVAL: u8 = 31;
    pub const ODS_VERSION: u8 = 32;
    pub const ODS_MINOR_VERSION: u8 = 33;
    pub const NO_RESERVE: u8 = 34;
    pub const FORCED_WRITES: u8 = 52;
    pub const USER_NAMES: u8 = 53;
    pub const PAGE_ERRORS: u8 = 54;
    pub const RECORD_ERRORS: u8 = 55;
    pub const BPAGE_ERRORS: u8 = 56;
    pub const DPAGE_ERRORS: u8 = 57;
    pub const IPAGE_ERRORS: u8 = 58;
    pub const PPAGE_ERRORS: u8 = 59;
    pub const TPAGE_ERRORS: u8 = 60;
    pub const SET_PAGE_BUFFERS: u8 = 61;
    pub const DB_SQL_DIALECT: u8 = 62;
    pub const DB_READ_ONLY: u8 = 63;
    pub const DB_SIZE_IN_PAGES: u8 = 64;
    pub const ATT_CHARSET: u8 = 101;
    pub const DB_CLASS: u8 = 102;
    pub const FIREBIRD_VERSION: u8 = 103;
    pub const OLDEST_TRANSACTION: u8 = 104;
    pub const OLDEST_ACTIVE: u8 = 105;
    pub const OLDEST_SNAPSHOT: u8 = 106;
    pub const NEXT_TRANSACTION: u8 = 107;
    pub const DB_PROVIDER: u8 = 108;
    pub const ACTIVE_TRANSACTIONS: u8 = 109;
    pub const ACTIVE_TRAN_COUNT: u8 = 110;
    pub const CREATION_DATE: u8 = 111;
    pub const DB_FILE_SIZE: u8 = 112;

    /// `DB_CLASS` value for a classic server
    pub const CLASS_CLASSIC: i32 = 13;
    /// `DB_CLASS` value for a super server
    pub const CLASS_SUPER: i32 = 14;
}

/// Statement information items (`op_info_sql`)
#[allow(missing_docs)]
pub mod sql_info {
    pub const SELECT: u8 = 4;
    pub const BIND: u8 = 5;
    pub const NUM_VARIABLES: u8 = 6;
    pub const DESCRIBE_VARS: u8 = 7;
    pub const DESCRIBE_END: u8 = 8;
    pub const SQLDA_SEQ: u8 = 9;
    pub const MESSAGE_SEQ: u8 = 10;
    pub const TYPE: u8 = 11;
    pub const SUB_TYPE: u8 = 12;
    pub const SCALE: u8 = 13;
    pub const LENGTH: u8 = 14;
    pub const NULL_IND: u8 = 15;
    pub const FIELD: u8 = 16;
    pub const RELATION: u8 = 17;
    pub const OWNER: u8 = 18;
    pub const ALIAS: u8 = 19;
    pub const SQLDA_START: u8 = 20;
    pub const STMT_TYPE: u8 = 21;
    pub const GET_PLAN: u8 = 22;
    pub const RECORDS: u8 = 23;
    pub const BATCH_FETCH: u8 = 24;

    pub const REQ_SELECT_COUNT: u8 = 13;
    pub const REQ_INSERT_COUNT: u8 = 14;
    pub const REQ_UPDATE_COUNT: u8 = 15;
    pub const REQ_DELETE_COUNT: u8 = 16;
}

/// Blob information items
#[allow(missing_docs)]
pub mod blob_info {
    pub const NUM_SEGMENTS: u8 = 4;
    pub const MAX_SEGMENT: u8 = 5;
    pub const TOTAL_LENGTH: u8 = 6;
    pub const TYPE: u8 = 7;
}

/// Service information items
#[allow(missing_docs)]
pub mod svc_info {
    pub const SVR_DB_INFO: u8 = 50;
    pub const GET_LICENSE: u8 = 51;
    pub const GET_LICENSE_MASK: u8 = 52;
    pub const GET_CONFIG: u8 = 53;
    pub const VERSION: u8 = 54;
    pub const SERVER_VERSION: u8 = 55;
    pub const IMPLEMENTATION: u8 = 56;
    pub const CAPABILITIES: u8 = 57;
    pub const USER_DBPATH: u8 = 58;
    pub const GET_ENV: u8 = 59;
    pub const GET_ENV_LOCK: u8 = 60;
    pub const GET_ENV_MSG: u8 = 61;
    pub const LINE: u8 = 62;
    pub const TO_EOF: u8 = 63;
    pub const TIMEOUT: u8 = 64;
    pub const LIMBO_TRANS: u8 = 66;
    pub const RUNNING: u8 = 67;
    pub const GET_USERS: u8 = 68;
}

// =============================================================================
// Statement Handling
// =============================================================================

/// Statement type codes returned by `isc_info_sql_stmt_type`
#[allow(missing_docs)]
pub mod stmt_type {
    pub const SELECT: i32 = 1;
    pub const INSERT: i32 = 2;
    pub const UPDATE: i32 = 3;
    pub const DELETE: i32 = 4;
    pub const DDL: i32 = 5;
    pub const GET_SEGMENT: i32 = 6;
    pub const PUT_SEGMENT: i32 = 7;
    pub const EXEC_PROCEDURE: i32 = 8;
    pub const START_TRANS: i32 = 9;
    pub const COMMIT: i32 = 10;
    pub const ROLLBACK: i32 = 11;
    pub const SELECT_FOR_UPDATE: i32 = 12;
    pub const SET_GENERATOR: i32 = 13;
    pub const SAVEPOINT: i32 = 14;
}

/// Options for `op_free_statement`
#[allow(missing_docs)]
pub mod dsql {
    pub const CLOSE: i32 = 1;
    pub const DROP: i32 = 2;
    pub const UNPREPARE: i32 = 4;
}

/// Fetch status returned in `op_fetch_response` once the cursor is exhausted
pub const FETCH_NO_MORE_ROWS: i32 = 100;

/// Server blob status reported in the object handle of a segment response
#[allow(missing_docs)]
pub mod blob_status {
    pub const SEGMENT: i32 = 1;
    pub const EOF: i32 = 2;
}

/// Out-of-band cancel kinds for `op_cancel`
#[allow(missing_docs)]
pub mod cancel {
    pub const DISABLE: i32 = 1;
    pub const ENABLE: i32 = 2;
    pub const RAISE: i32 = 3;
    pub const ABORT: i32 = 4;
}

// =============================================================================
// SQL Types
// =============================================================================

/// SQL type codes as reported by describe (the low bit marks nullability)
#[allow(missing_docs)]
pub mod sql_type {
    pub const VARYING: i32 = 448;
    pub const TEXT: i32 = 452;
    pub const DOUBLE: i32 = 480;
    pub const FLOAT: i32 = 482;
    pub const LONG: i32 = 496;
    pub const SHORT: i32 = 500;
    pub const TIMESTAMP: i32 = 510;
    pub const BLOB: i32 = 520;
    pub const D_FLOAT: i32 = 530;
    pub const ARRAY: i32 = 540;
    pub const QUAD: i32 = 550;
    pub const TIME: i32 = 560;
    pub const DATE: i32 = 570;
    pub const INT64: i32 = 580;
    pub const BOOLEAN: i32 = 32764;
    pub const NULL: i32 = 32766;
}

// =============================================================================
// BLR and SDL
// =============================================================================

/// Binary language representation codes used for message formats
#[allow(missing_docs)]
pub mod blr {
    pub const TEXT: u8 = 14;
    pub const TEXT2: u8 = 15;
    pub const SHORT: u8 = 7;
    pub const LONG: u8 = 8;
    pub const QUAD: u8 = 9;
    pub const FLOAT: u8 = 10;
    pub const DOUBLE: u8 = 27;
    pub const D_FLOAT: u8 = 11;
    pub const TIMESTAMP: u8 = 35;
    pub const VARYING: u8 = 37;
    pub const VARYING2: u8 = 38;
    pub const CSTRING: u8 = 40;
    pub const CSTRING2: u8 = 41;
    pub const BLOB_ID: u8 = 45;
    pub const SQL_DATE: u8 = 12;
    pub const SQL_TIME: u8 = 13;
    pub const INT64: u8 = 16;
    pub const BOOL: u8 = 23;

    pub const VERSION4: u8 = 4;
    pub const VERSION5: u8 = 5;
    pub const EOC: u8 = 76;
    pub const END: u8 = 255;
    pub const BEGIN: u8 = 2;
    pub const MESSAGE: u8 = 4;
}

/// Slice description language codes used for array access
#[allow(missing_docs)]
pub mod sdl {
    pub const VERSION1: u8 = 1;
    pub const EOC: u8 = 255;
    pub const RELATION: u8 = 2;
    pub const RID: u8 = 3;
    pub const FIELD: u8 = 4;
    pub const FID: u8 = 5;
    pub const STRUCT: u8 = 6;
    pub const VARIABLE: u8 = 7;
    pub const SCALAR: u8 = 8;
    pub const TINY_INTEGER: u8 = 9;
    pub const SHORT_INTEGER: u8 = 10;
    pub const LONG_INTEGER: u8 = 11;
    pub const DO3: u8 = 33;
    pub const DO2: u8 = 34;
    pub const DO1: u8 = 35;
    pub const ELEMENT: u8 = 36;

    /// Maximum number of array dimensions
    pub const MAX_DIMENSIONS: usize = 16;
}

// =============================================================================
// Buffer Sizes
// =============================================================================

/// Default receive buffer length for info requests
pub const DEFAULT_MAX_BUFFER_SIZE: i32 = 8192;

/// Buffer length for the statement type query
pub const STATEMENT_TYPE_BUFFER_SIZE: i32 = 8;

/// Buffer length for the records-affected query
pub const ROWS_AFFECTED_BUFFER_SIZE: i32 = 34;

/// Buffer length for the describe part of prepare
pub const PREPARE_INFO_BUFFER_SIZE: i32 = 32768;

/// Largest segment the server hands out in one `op_get_segment`
pub const MAX_SEGMENT_SIZE: usize = 32767;
