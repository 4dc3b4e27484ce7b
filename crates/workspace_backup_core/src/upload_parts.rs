const MIB: u64 = 1024 * 1024;

/// Archives at least this large are uploaded in parts.
pub const MULTIPART_THRESHOLD_BYTES: u64 = 8 * MIB;
/// Smallest part size used. S3 itself requires at least 5 MiB for every part
/// but the last.
pub const MIN_PART_SIZE_BYTES: u64 = 8 * MIB;
/// S3 limit on parts per multipart upload.
pub const MAX_PARTS: u64 = 10_000;

/// Byte range of the archive sent as one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// 1-based, as S3 numbers parts.
    pub part_number: i32,
    pub offset: u64,
    pub length: u64,
}

pub fn uses_multipart(total_bytes: u64) -> bool {
    total_bytes >= MULTIPART_THRESHOLD_BYTES
}

/// Part size that keeps `total_bytes` within [`MAX_PARTS`], rounded up to a
/// whole MiB.
pub fn part_size_for(total_bytes: u64) -> u64 {
    let needed = total_bytes.div_ceil(MAX_PARTS).div_ceil(MIB) * MIB;
    needed.max(MIN_PART_SIZE_BYTES)
}

/// Splits `total_bytes` into contiguous parts; only the last may be short.
pub fn plan_parts(total_bytes: u64) -> Vec<PartRange> {
    let part_size = part_size_for(total_bytes);
    let mut parts = Vec::new();
    let mut offset = 0u64;
    let mut part_number = 1i32;

    while offset < total_bytes {
        let length = part_size.min(total_bytes - offset);
        parts.push(PartRange {
            part_number,
            offset,
            length,
        });
        offset += length;
        part_number += 1;
    }

    parts
}
