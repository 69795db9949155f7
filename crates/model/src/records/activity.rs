use crate::error::RecordError;

/// Number of values carried by one decoded activity row.
pub const FIELD_COUNT: usize = 8;

/// One decoded input row, in file column order.
///
/// Values are kept exactly as they appeared in the input; the `null`
/// sentinel is only interpreted when the record is turned into a
/// [`BindingRow`](crate::records::binding::BindingRow).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub marketo_guid: String,
    pub lead_id: String,
    pub activity_date: String,
    pub activity_type_id: String,
    pub campaign_id: String,
    pub primary_attribute_value_id: String,
    pub primary_attribute_value: String,
    pub attributes: String,
}

impl ActivityRecord {
    /// Builds a record from the raw values of one row.
    ///
    /// Fails unless exactly [`FIELD_COUNT`] values are supplied.
    pub fn from_fields<I, S>(fields: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = fields.into_iter().map(Into::into).collect();
        let found = values.len();
        let [
            marketo_guid,
            lead_id,
            activity_date,
            activity_type_id,
            campaign_id,
            primary_attribute_value_id,
            primary_attribute_value,
            attributes,
        ]: [String; FIELD_COUNT] = values.try_into().map_err(|_| RecordError::Arity {
            expected: FIELD_COUNT,
            found,
        })?;

        Ok(ActivityRecord {
            marketo_guid,
            lead_id,
            activity_date,
            activity_type_id,
            campaign_id,
            primary_attribute_value_id,
            primary_attribute_value,
            attributes,
        })
    }
}
