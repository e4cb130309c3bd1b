//! Bulk application files: the downloadable sample and the CSV layout the
//! backend accepts for bulk uploads.

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use cardops_client::{ApplicationEntry, DeliverTo};

use crate::error::{ConsoleError, Result};

pub const SAMPLE_FILE_NAME: &str = "bulk_application.csv";

/// Column order of a bulk file. Matches `ApplicationEntry` field order.
pub const HEADERS: [&str; 13] = [
    "kitNumber",
    "name",
    "mobile",
    "email",
    "amount",
    "deliverTo",
    "addressLine1",
    "addressLine2",
    "addressLine3",
    "city",
    "state",
    "country",
    "pincode",
];

pub fn sample_entry() -> ApplicationEntry {
    ApplicationEntry {
        kit_number: "KIT123456".to_string(),
        name: "Venkatesh Prasath".to_string(),
        mobile: "9876543210".to_string(),
        email: "venkat@example.com".to_string(),
        amount: "500.00".to_string(),
        deliver_to: DeliverTo::Home,
        address_line1: "No 12, ABC Street".to_string(),
        address_line2: "2nd Cross".to_string(),
        address_line3: "Near Bus Stand".to_string(),
        city: "Chennai".to_string(),
        state: "Tamil Nadu".to_string(),
        country: "India".to_string(),
        pincode: "600001".to_string(),
    }
}

/// Header plus one sample row.
pub fn sample_csv() -> Result<Vec<u8>> {
    write_entries(&[sample_entry()])
}

/// Write entries as a bulk file. Fields containing a comma or quote are
/// quoted with doubled inner quotes; records end with `\n`.
pub fn write_entries(entries: &[ApplicationEntry]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADERS)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer
        .into_inner()
        .map_err(|e| ConsoleError::Csv(e.to_string()))
}

/// Read a bulk file back into entries. The header row must match
/// [`HEADERS`] exactly, in order.
pub fn parse_entries(contents: &[u8]) -> Result<Vec<ApplicationEntry>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents);

    let headers = reader.headers()?;
    if headers.iter().ne(HEADERS.iter().copied()) {
        return Err(ConsoleError::Csv(format!(
            "unexpected header row: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_has_fixed_header_and_quoted_address() {
        let sample = String::from_utf8(sample_csv().unwrap()).unwrap();
        let mut lines = sample.lines();
        assert_eq!(
            lines.next().unwrap(),
            "kitNumber,name,mobile,email,amount,deliverTo,addressLine1,addressLine2,addressLine3,city,state,country,pincode"
        );
        assert_eq!(
            lines.next().unwrap(),
            "KIT123456,Venkatesh Prasath,9876543210,venkat@example.com,500.00,HOME,\"No 12, ABC Street\",2nd Cross,Near Bus Stand,Chennai,Tamil Nadu,India,600001"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn comma_in_name_is_quoted_and_read_back() {
        let entry = ApplicationEntry {
            name: "Doe, Jane".to_string(),
            ..sample_entry()
        };
        let written = write_entries(&[entry.clone()]).unwrap();
        let text = String::from_utf8(written.clone()).unwrap();
        assert!(text.contains(",\"Doe, Jane\","));

        let parsed = parse_entries(&written).unwrap();
        assert_eq!(parsed, vec![entry]);
    }

    #[test]
    fn quotes_are_doubled() {
        let entry = ApplicationEntry {
            address_line2: "Block \"B\"".to_string(),
            ..sample_entry()
        };
        let text = String::from_utf8(write_entries(&[entry.clone()]).unwrap()).unwrap();
        assert!(text.contains("\"Block \"\"B\"\"\""));
        assert_eq!(parse_entries(text.as_bytes()).unwrap()[0], entry);
    }

    #[test]
    fn unmodified_sample_round_trips_byte_for_byte() {
        let sample = sample_csv().unwrap();
        let entries = parse_entries(&sample).unwrap();
        assert_eq!(entries, vec![sample_entry()]);
        assert_eq!(write_entries(&entries).unwrap(), sample);
    }

    #[test]
    fn virtual_row_with_blank_optional_columns_parses() {
        let file = format!(
            "{}\n,Jane,9876543210,j@x.com,100,,,,,,,,\n",
            HEADERS.join(",")
        );
        let entries = parse_entries(file.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Jane");
        assert_eq!(entries[0].deliver_to, DeliverTo::Home);
        assert!(entries[0].address_line1.is_empty());
        assert!(entries[0].pincode.is_empty());
    }

    #[test]
    fn reordered_header_is_rejected() {
        let file = b"name,kitNumber\nJane,KIT1\n";
        assert!(matches!(parse_entries(file), Err(ConsoleError::Csv(_))));
    }

    #[test]
    fn header_only_file_has_no_entries() {
        let header = write_entries(&[]).unwrap();
        assert!(parse_entries(&header).unwrap().is_empty());
    }
}
