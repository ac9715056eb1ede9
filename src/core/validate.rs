use crate::domain::model::{normalize_identity, CustomerRecord, LessonType, RawCustomerRecord};
use crate::domain::report::SkippedRecord;
use crate::utils::error::RecordError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Manual correction for one customer, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOverride {
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub canceled_date: Option<NaiveDate>,
    /// Marks the customer as never having left.
    #[serde(default)]
    pub clear_cancellation: bool,
}

impl RecordOverride {
    fn apply(&self, record: &mut CustomerRecord) {
        if let Some(start) = self.start_date {
            record.start_date = start;
        }
        if self.clear_cancellation {
            record.canceled_date = None;
        } else if let Some(canceled) = self.canceled_date {
            record.canceled_date = Some(canceled);
        }
    }
}

/// Turns raw rows into validated records, collecting the rows it rejects.
#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    as_of: Option<NaiveDate>,
    overrides: Vec<RecordOverride>,
}

impl RecordValidator {
    pub fn new(as_of: Option<NaiveDate>, overrides: Vec<RecordOverride>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|o| RecordOverride {
                email: normalize_identity(&o.email),
                ..o
            })
            .collect();
        Self { as_of, overrides }
    }

    pub fn validate_batch(
        &self,
        raw: &[RawCustomerRecord],
    ) -> (Vec<CustomerRecord>, Vec<SkippedRecord>) {
        let mut valid = Vec::with_capacity(raw.len());
        let mut skipped = Vec::new();

        for (row, record) in raw.iter().enumerate() {
            match self.validate(record) {
                Ok(customer) => valid.push(customer),
                Err(error) => {
                    let identity = clean(&record.email).map(normalize_identity);
                    tracing::debug!("Skipping row {} ({:?}): {}", row, identity, error);
                    skipped.push(SkippedRecord::new(Some(row), identity, error));
                }
            }
        }

        (valid, skipped)
    }

    pub fn validate(&self, raw: &RawCustomerRecord) -> Result<CustomerRecord, RecordError> {
        let mut record = parse_record(raw)?;

        if let Some(fix) = self.overrides.iter().find(|o| o.email == record.email) {
            tracing::debug!("Applying override for {}", record.email);
            fix.apply(&mut record);
        }

        if let Some(canceled) = record.canceled_date {
            if canceled < record.start_date {
                return Err(RecordError::InvalidDateRange {
                    start: record.start_date,
                    canceled,
                });
            }
        }

        if let Some(as_of) = self.as_of {
            if record.start_date > as_of {
                return Err(RecordError::AfterCutoff {
                    start: record.start_date,
                    as_of,
                });
            }
            // 截止日之後的取消視為仍在期
            if record.canceled_date.is_some_and(|c| c > as_of) {
                record.canceled_date = None;
            }
        }

        Ok(record)
    }
}

fn parse_record(raw: &RawCustomerRecord) -> Result<CustomerRecord, RecordError> {
    let email = clean(&raw.email)
        .map(normalize_identity)
        .ok_or(RecordError::MissingField("email"))?;
    let start_raw = clean(&raw.start_date).ok_or(RecordError::MissingField("start_date"))?;
    let start_date = parse_date("start_date", start_raw)?;
    let canceled_date = clean(&raw.canceled_date)
        .map(|value| parse_date("canceled_date", value))
        .transpose()?;
    let amount = parse_amount(clean(&raw.amount).ok_or(RecordError::MissingField("amount"))?)?;

    let lesson_type = clean(&raw.lesson_type)
        .map(|value| {
            value
                .parse::<LessonType>()
                .map_err(|_| RecordError::InvalidField {
                    field: "lesson_type",
                    value: value.to_string(),
                })
        })
        .transpose()?;

    let weekly_frequency = clean(&raw.weekly_frequency)
        .map(parse_frequency)
        .transpose()?;

    Ok(CustomerRecord {
        email,
        name: clean(&raw.name).map(|n| n.to_lowercase()),
        start_date,
        canceled_date,
        amount,
        lesson_type,
        weekly_frequency,
        status: clean(&raw.status).map(|s| s.to_lowercase()),
    })
}

fn clean(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts ISO dates (a trailing time part is dropped) and `DD/MM/YYYY`.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, RecordError> {
    let date_part = value
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(value);

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .ok_or_else(|| RecordError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

/// Reads a config date written either as a bare TOML date (`2023-06-30`) or
/// as a quoted string in one of the accepted record formats.
pub fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<toml::Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(toml::Value::String(text)) => parse_date("date", text.trim())
            .map(Some)
            .map_err(D::Error::custom),
        Some(toml::Value::Datetime(datetime)) => {
            let date = datetime
                .date
                .ok_or_else(|| D::Error::custom(format!("'{}' has no date part", datetime)))?;
            NaiveDate::from_ymd_opt(
                i32::from(date.year),
                u32::from(date.month),
                u32::from(date.day),
            )
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("'{}' is not a calendar date", datetime)))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected a date such as 2023-06-30, found {}",
            other.type_str()
        ))),
    }
}

fn parse_amount(value: &str) -> Result<f64, RecordError> {
    let digits = value.trim_start_matches(['$', '€', '£']).replace(',', "");
    match digits.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(RecordError::InvalidAmount(value.to_string())),
    }
}

fn parse_frequency(value: &str) -> Result<u32, RecordError> {
    let invalid = || RecordError::InvalidField {
        field: "weekly_frequency",
        value: value.to_string(),
    };
    // exports sometimes carry "2.0"
    let parsed = value.parse::<f64>().map_err(|_| invalid())?;
    if parsed.fract() != 0.0 || parsed < 1.0 || parsed > f64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(parsed as u32)
}
