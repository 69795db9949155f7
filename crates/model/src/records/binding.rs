use crate::records::activity::{ActivityRecord, FIELD_COUNT};

/// Literal input value that stands for SQL NULL.
pub const NULL_SENTINEL: &str = "null";

/// Insert parameters for one row, after NULL-sentinel coercion.
///
/// Every column is carried as optional text; `None` binds as SQL NULL.
/// The import identifier is not part of the row, it is bound once per
/// statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingRow {
    pub marketo_guid: Option<String>,
    pub lead_id: Option<String>,
    pub activity_date: Option<String>,
    pub activity_type_id: Option<String>,
    pub campaign_id: Option<String>,
    pub primary_attribute_value_id: Option<String>,
    pub primary_attribute_value: Option<String>,
    pub attributes: Option<String>,
}

fn nullify(value: String) -> Option<String> {
    if value == NULL_SENTINEL {
        None
    } else {
        Some(value)
    }
}

impl From<ActivityRecord> for BindingRow {
    fn from(record: ActivityRecord) -> Self {
        BindingRow {
            marketo_guid: nullify(record.marketo_guid),
            lead_id: nullify(record.lead_id),
            activity_date: nullify(record.activity_date),
            activity_type_id: nullify(record.activity_type_id),
            campaign_id: nullify(record.campaign_id),
            primary_attribute_value_id: nullify(record.primary_attribute_value_id),
            primary_attribute_value: nullify(record.primary_attribute_value),
            attributes: nullify(record.attributes),
        }
    }
}

impl BindingRow {
    /// Column values in insert order.
    pub fn columns(&self) -> [&Option<String>; FIELD_COUNT] {
        [
            &self.marketo_guid,
            &self.lead_id,
            &self.activity_date,
            &self.activity_type_id,
            &self.campaign_id,
            &self.primary_attribute_value_id,
            &self.primary_attribute_value,
            &self.attributes,
        ]
    }
}
