/// GRIB message framing.
///
/// A NOMADS grib-filter response for one forecast hour is a concatenation
/// of GRIB2 messages. For hour files past the first, APCP comes as two
/// records: the run-total accumulation followed by the single-hour
/// accumulation. Only the framing is handled here; decoding the selected
/// record is the decoder's job.
///
/// Message layout (indicator section):
///
/// | bytes   | GRIB2                      | GRIB1                  |
/// |---------|----------------------------|------------------------|
/// | 0..4    | `GRIB`                     | `GRIB`                 |
/// | 4..7    | reserved + discipline      | total length (24-bit)  |
/// | 7       | edition (2)                | edition (1)            |
/// | 8..16   | total length (64-bit BE)   |                        |
///
/// Every message ends with the `7777` end section.

pub const GRIB_MAGIC: &[u8; 4] = b"GRIB";
pub const END_MARKER: &[u8; 4] = b"7777";

const GRIB2_HEADER_LEN: usize = 16;
const GRIB1_HEADER_LEN: usize = 8;

/// Splits a payload into its GRIB messages.
///
/// Bytes between messages are skipped until the next `GRIB` marker.
/// Returns an error for a payload with no messages, a truncated message,
/// or a message whose declared length does not end in `7777`.
pub fn split_messages(bytes: &[u8]) -> Result<Vec<&[u8]>, String> {
    let mut messages = Vec::new();
    let mut offset = 0;

    while let Some(start) = find_magic(bytes, offset) {
        let rest = &bytes[start..];
        let length = message_length(rest)?;

        if length > rest.len() {
            return Err(format!(
                "GRIB message at byte {} declares {} bytes but only {} remain",
                start,
                length,
                rest.len()
            ));
        }
        if length < GRIB1_HEADER_LEN + END_MARKER.len() || &rest[length - 4..length] != END_MARKER {
            return Err(format!("GRIB message at byte {} is missing its end section", start));
        }

        messages.push(&rest[..length]);
        offset = start + length;
    }

    if messages.is_empty() {
        return Err(format!("payload of {} bytes contains no GRIB messages", bytes.len()));
    }

    Ok(messages)
}

/// Picks the record for one hour.
///
/// Single-hour requests take the second message when the payload has more
/// than one (the first is the run total); cumulative requests, and
/// single-message payloads, take the first.
pub fn select_record(bytes: &[u8], cumulative: bool) -> Result<&[u8], String> {
    let messages = split_messages(bytes)?;
    let index = if !cumulative && messages.len() > 1 { 1 } else { 0 };
    Ok(messages[index])
}

fn find_magic(bytes: &[u8], from: usize) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(GRIB_MAGIC.len())
        .position(|w| w == GRIB_MAGIC)
        .map(|pos| from + pos)
}

fn message_length(message: &[u8]) -> Result<usize, String> {
    if message.len() < GRIB1_HEADER_LEN {
        return Err("truncated GRIB indicator section".to_string());
    }

    match message[7] {
        2 => {
            if message.len() < GRIB2_HEADER_LEN {
                return Err("truncated GRIB2 indicator section".to_string());
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&message[8..16]);
            usize::try_from(u64::from_be_bytes(raw))
                .map_err(|_| "GRIB2 message length does not fit in memory".to_string())
        }
        1 => Ok(((message[4] as usize) << 16) | ((message[5] as usize) << 8) | message[6] as usize),
        edition => Err(format!("unsupported GRIB edition {}", edition)),
    }
}
