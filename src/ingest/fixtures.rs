/// Test fixtures for the ingest layer: framed GRIB payloads and the text
/// wgrib2 prints, so framing and parsing tests run without network access
/// or a wgrib2 install.

/// A GRIB2 message wrapping `body`: 16-byte indicator section, body, `7777`.
pub fn grib2_message(body: &[u8]) -> Vec<u8> {
    let total = (16 + body.len() + 4) as u64;
    let mut message = b"GRIB".to_vec();
    message.extend_from_slice(&[0, 0, 0, 2]);
    message.extend_from_slice(&total.to_be_bytes());
    message.extend_from_slice(body);
    message.extend_from_slice(b"7777");
    message
}

/// A GRIB1 message wrapping `body`: 8-byte indicator section, body, `7777`.
pub fn grib1_message(body: &[u8]) -> Vec<u8> {
    let total = 8 + body.len() + 4;
    let mut message = b"GRIB".to_vec();
    message.push(((total >> 16) & 0xff) as u8);
    message.push(((total >> 8) & 0xff) as u8);
    message.push((total & 0xff) as u8);
    message.push(1);
    message.extend_from_slice(body);
    message.extend_from_slice(b"7777");
    message
}

/// Hour file with the run-total record first and the hourly record second.
pub fn two_record_payload() -> Vec<u8> {
    let mut payload = grib2_message(b"total");
    payload.extend(grib2_message(b"hourly"));
    payload
}

/// `wgrib2 -nxny` output for a 3 x 2 grid.
pub const NXNY_3X2: &str = "1:0:(3 x 2)\n";

/// `wgrib2 -csv` output for a 3 x 2 grid (nx = 3 columns, ny = 2 rows),
/// west to east then south to north. Values are kg/m^2.
pub const CSV_3X2: &str = "\
\"2019-08-03 12:00:00\",\"2019-08-03 13:00:00\",\"APCP\",\"surface\",-89.6,40.6,0
\"2019-08-03 12:00:00\",\"2019-08-03 13:00:00\",\"APCP\",\"surface\",-89.57,40.6,1.5
\"2019-08-03 12:00:00\",\"2019-08-03 13:00:00\",\"APCP\",\"surface\",-89.54,40.6,2.25
\"2019-08-03 12:00:00\",\"2019-08-03 13:00:00\",\"APCP\",\"surface\",-89.6,40.63,3
\"2019-08-03 12:00:00\",\"2019-08-03 13:00:00\",\"APCP\",\"surface\",-89.57,40.63,9.999e+20
\"2019-08-03 12:00:00\",\"2019-08-03 13:00:00\",\"APCP\",\"surface\",-89.54,40.63,12.7
";
