//! Parsing of the delimited patient dataset into typed records.
//!
//! The dataset is comma-separated text with a single header line. Fields may
//! be wrapped in double quotes to embed commas. List columns hold
//! comma-separated items, and the visit column uses a bracketed
//! `[<date>: <diagnosis>], ...` sub-format.

use nom::{
    bytes::complete::{take_until, tag},
    character::complete::char,
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};

use crate::record::{Record, Visit};

/// Minimum number of fields a data line must carry to become a record.
pub const MIN_FIELDS: usize = 10;

/// Zero-based column positions of each record field.
///
/// The header line is never consulted; positions come from this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Full name column.
    pub full_name: usize,
    /// Age column.
    pub age: usize,
    /// Gender column.
    pub gender: usize,
    /// Region column.
    pub region: usize,
    /// Address column.
    pub address: usize,
    /// Chronic conditions column.
    pub symptoms: usize,
    /// Medication history column.
    pub medication_history: usize,
    /// Past visits column.
    pub past_visits: usize,
    /// Phone number column.
    pub phone_number: usize,
    /// Insurance id column.
    pub insurance_id: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            full_name: 0,
            age: 1,
            gender: 2,
            region: 3,
            address: 4,
            symptoms: 5,
            medication_history: 6,
            past_visits: 7,
            phone_number: 8,
            insurance_id: 9,
        }
    }
}

impl ColumnLayout {
    /// Number of fields a line needs for every column in this layout.
    pub fn required_fields(&self) -> usize {
        let highest = [
            self.full_name,
            self.age,
            self.gender,
            self.region,
            self.address,
            self.symptoms,
            self.medication_history,
            self.past_visits,
            self.phone_number,
            self.insurance_id,
        ]
        .into_iter()
        .max()
        .unwrap_or_default();

        MIN_FIELDS.max(highest + 1)
    }
}

/// Output of a dataset parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRecords {
    /// Parsed records in input order.
    pub records: Vec<Record>,
    /// Number of non-empty data lines dropped for having too few fields.
    pub skipped_rows: usize,
}

/// Parses dataset text into records.
///
/// Empty lines are ignored and the first non-empty line is treated as the
/// header. Lines with too few fields are skipped and counted, never
/// reported as errors.
///
/// # Examples
///
/// ```rust
/// use ehr_query_executor::{parse_records, ColumnLayout};
///
/// let text = "name,age,gender,region,address,conditions,meds,visits,phone,insurance\n\
///             Ana,34,Female,North,\"1 Main St, Town\",Asthma,None,\"[2024-01-05: Flu]\",555,INS-1\n";
/// let loaded = parse_records(text, &ColumnLayout::default());
/// assert_eq!(loaded.records.len(), 1);
/// assert_eq!(loaded.records[0].address, "1 Main St, Town");
/// assert!(loaded.records[0].medication_history.is_empty());
/// ```
pub fn parse_records(text: &str, layout: &ColumnLayout) -> LoadedRecords {
    let required = layout.required_fields();
    let mut loaded = LoadedRecords::default();

    let lines = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .skip(1);

    for line in lines {
        let fields = split_fields(line);
        if fields.len() < required {
            loaded.skipped_rows += 1;
            continue;
        }
        loaded.records.push(build_record(&fields, layout));
    }

    if loaded.skipped_rows > 0 {
        tracing::debug!(
            skipped = loaded.skipped_rows,
            required,
            "skipped dataset rows with too few fields"
        );
    }

    loaded
}

fn build_record(fields: &[String], layout: &ColumnLayout) -> Record {
    let field = |index: usize| fields.get(index).map(String::as_str).unwrap_or_default();

    Record {
        full_name: field(layout.full_name).to_string(),
        age: field(layout.age).parse().unwrap_or(0),
        gender: field(layout.gender).to_string(),
        region: field(layout.region).to_string(),
        address: field(layout.address).to_string(),
        symptoms: parse_list(field(layout.symptoms)),
        medication_history: parse_list(field(layout.medication_history)),
        past_visits: parse_visits(field(layout.past_visits)),
        phone_number: field(layout.phone_number).to_string(),
        insurance_id: field(layout.insurance_id).to_string(),
    }
}

/// Splits one line into trimmed fields.
///
/// Commas inside double quotes do not split. Every `"` toggles quoted mode
/// and is dropped from the output.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Parses a comma-separated list column. The literal `None` is an empty list.
pub fn parse_list(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() || value == "None" {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the visit column: `[<date>: <diagnosis>], [<date>: <diagnosis>]`.
///
/// Each bracketed group is split on its first colon. Groups without a colon
/// are skipped; an unterminated `[` ends the scan.
pub fn parse_visits(value: &str) -> Vec<Visit> {
    let groups = match bracket_groups(value) {
        Ok((_, groups)) => groups,
        Err(_) => Vec::new(),
    };

    groups
        .into_iter()
        .filter_map(|group| {
            let (date, diagnosis) = group.split_once(':')?;
            Some(Visit::new(date.trim(), diagnosis.trim()))
        })
        .collect()
}

fn bracket_groups(input: &str) -> IResult<&str, Vec<&str>> {
    many0(preceded(
        take_until("["),
        delimited(char('['), take_until("]"), tag("]")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Full Name,Age,Gender,Region,Address,Chronic Conditions,Medication History,Past Visits,Phone,Insurance ID";

    fn row(fields: &[&str]) -> String {
        fields.join(",")
    }

    mod fields {
        use super::*;

        #[test]
        fn test_split_plain() {
            assert_eq!(split_fields("a, b ,c"), vec!["a", "b", "c"]);
        }

        #[test]
        fn test_split_quoted_commas() {
            assert_eq!(
                split_fields("x,\"Diabetes, Hypertension\",y"),
                vec!["x", "Diabetes, Hypertension", "y"]
            );
        }

        #[test]
        fn test_split_trailing_empty_field() {
            assert_eq!(split_fields("a,b,"), vec!["a", "b", ""]);
        }

        #[test]
        fn test_split_unbalanced_quote_swallows_rest() {
            assert_eq!(split_fields("a,\"b,c"), vec!["a", "b,c"]);
        }
    }

    mod lists {
        use super::*;

        #[test]
        fn test_parse_list() {
            assert_eq!(
                parse_list(" Diabetes , Hypertension,, "),
                vec!["Diabetes", "Hypertension"]
            );
        }

        #[test]
        fn test_parse_list_none_and_empty() {
            assert!(parse_list("None").is_empty());
            assert!(parse_list("  ").is_empty());
        }
    }

    mod visits {
        use super::*;

        #[test]
        fn test_two_visits_in_order() {
            let visits = parse_visits("[2024-10-06: Fever], [2024-08-16: Allergic Rhinitis]");
            assert_eq!(
                visits,
                vec![
                    Visit::new("2024-10-06", "Fever"),
                    Visit::new("2024-08-16", "Allergic Rhinitis"),
                ]
            );
        }

        #[test]
        fn test_group_without_colon_is_skipped() {
            let visits = parse_visits("[no colon here], [2023-01-01: Cough]");
            assert_eq!(visits, vec![Visit::new("2023-01-01", "Cough")]);
        }

        #[test]
        fn test_split_on_first_colon_only() {
            let visits = parse_visits("[2023-01-01: Note: follow-up]");
            assert_eq!(visits, vec![Visit::new("2023-01-01", "Note: follow-up")]);
        }

        #[test]
        fn test_unterminated_group_ends_scan() {
            let visits = parse_visits("[2023-01-01: Cough], [2023-02-02: Flu");
            assert_eq!(visits, vec![Visit::new("2023-01-01", "Cough")]);
        }

        #[test]
        fn test_empty_and_none() {
            assert!(parse_visits("").is_empty());
            assert!(parse_visits("None").is_empty());
        }
    }

    mod records {
        use super::*;

        #[test]
        fn test_header_is_discarded() {
            let loaded = parse_records(HEADER, &ColumnLayout::default());
            assert!(loaded.records.is_empty());
            assert_eq!(loaded.skipped_rows, 0);
        }

        #[test]
        fn test_full_row() {
            let text = format!(
                "{}\n{}\n",
                HEADER,
                row(&[
                    "John Smith",
                    "45",
                    "Male",
                    "North West",
                    "\"12 High St, Leeds\"",
                    "\"Diabetes, Hypertension\"",
                    "\"Metformin, Lisinopril\"",
                    "\"[2024-10-06: Fever], [2024-08-16: Allergic Rhinitis]\"",
                    "07700 900123",
                    "INS-0001",
                ])
            );
            let loaded = parse_records(&text, &ColumnLayout::default());
            assert_eq!(loaded.records.len(), 1);

            let record = &loaded.records[0];
            assert_eq!(record.full_name, "John Smith");
            assert_eq!(record.age, 45);
            assert_eq!(record.address, "12 High St, Leeds");
            assert_eq!(record.symptoms, vec!["Diabetes", "Hypertension"]);
            assert_eq!(record.medication_history, vec!["Metformin", "Lisinopril"]);
            assert_eq!(record.past_visits.len(), 2);
            assert_eq!(record.insurance_id, "INS-0001");
        }

        #[test]
        fn test_short_rows_skipped_and_counted() {
            let text = format!("{}\na,1,Male\n\n   \nb,2,Female,R,A,None,None,None,P,I\n", HEADER);
            let loaded = parse_records(&text, &ColumnLayout::default());
            assert_eq!(loaded.records.len(), 1);
            assert_eq!(loaded.skipped_rows, 1);
            assert_eq!(loaded.records[0].full_name, "b");
        }

        #[test]
        fn test_unparsable_age_is_zero() {
            let text = format!("{}\nx,unknown,Male,R,A,None,None,None,P,I", HEADER);
            let loaded = parse_records(&text, &ColumnLayout::default());
            assert_eq!(loaded.records[0].age, 0);
        }

        #[test]
        fn test_crlf_line_endings() {
            let text = format!("{}\r\nx,30,Male,R,A,None,None,None,P,I\r\n", HEADER);
            let loaded = parse_records(&text, &ColumnLayout::default());
            assert_eq!(loaded.records.len(), 1);
            assert_eq!(loaded.records[0].insurance_id, "I");
        }

        #[test]
        fn test_custom_layout() {
            let layout = ColumnLayout {
                full_name: 1,
                age: 0,
                ..ColumnLayout::default()
            };
            let text = format!("{}\n30,x,Male,R,A,None,None,None,P,I", HEADER);
            let loaded = parse_records(&text, &layout);
            assert_eq!(loaded.records[0].full_name, "x");
            assert_eq!(loaded.records[0].age, 30);
        }

        #[test]
        fn test_required_fields_grows_with_layout() {
            assert_eq!(ColumnLayout::default().required_fields(), 10);
            let wide = ColumnLayout {
                insurance_id: 12,
                ..ColumnLayout::default()
            };
            assert_eq!(wide.required_fields(), 13);
        }
    }
}
