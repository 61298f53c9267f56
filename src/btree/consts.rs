/// Sentinel stored in a flag or child-pointer slot meaning "no such
/// block" (spec §3: leaf `flag[0]`/`flag[1]` of `-1`, root-pointer
/// redirection).
pub const NO_BLOCK: i64 = -1;

/// Header size of a leaf page: `flag_0` (i64) @ offset 0, `flag_1`
/// (i64) @ offset 8, `num_records` (u32) @ offset 16 (spec §6 "slotted
/// page layout").
pub const LEAF_HEADER_SIZE: usize = 8 + 8 + 4;

/// Header size of a directory page: `flag_0` (i64) @ offset 0,
/// `num_records` (u32) @ offset 8 — directories carry no `flag_1` slot
/// (spec §6).
pub const DIR_HEADER_SIZE: usize = 8 + 4;

/// Size in bytes of a leaf record's non-key payload: data block number
/// (i64) + data slot number (i32) (spec §6 "leaf slot").
pub const LEAF_PAYLOAD_SIZE: usize = 8 + 4;

/// Size in bytes of a directory record's non-key payload: child block
/// number (i64) (spec §6 "directory slot").
pub const DIR_PAYLOAD_SIZE: usize = 8;
