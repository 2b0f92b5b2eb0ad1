use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field values of an in-progress enrollment application.
///
/// Every field is optional on its own; an empty string or `false` means "not
/// filled in yet". Missing keys deserialize to their defaults so partially
/// stored drafts load cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormData {
    // Student
    pub student_name: String,
    pub date_of_birth: String,
    pub grade: String,
    pub previous_school: String,

    // Guardian
    pub guardian_name: String,
    pub guardian_relationship: String,
    pub guardian_phone: String,
    pub guardian_email: String,
    pub address: String,

    // Medical
    pub has_medical_conditions: bool,
    pub medical_conditions: String,
    pub has_allergies: bool,
    pub allergies: String,

    // Emergency contact
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,

    pub notes: String,
}

/// Completion flags for the three sections of the form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Progress {
    pub student_info: bool,
    pub guardian_info: bool,
    pub additional_info: bool,
}

impl Progress {
    pub const SECTIONS: u32 = 3;

    #[must_use]
    pub fn completed_sections(self) -> u32 {
        [self.student_info, self.guardian_info, self.additional_info]
            .into_iter()
            .filter(|done| *done)
            .count() as u32
    }

    /// Rounded share of completed sections, 0 to 100.
    #[must_use]
    pub fn percentage(self) -> u8 {
        let pct = (100.0 * f64::from(self.completed_sections()) / f64::from(Self::SECTIONS)).round();
        pct as u8
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        self.completed_sections() == Self::SECTIONS
    }
}

/// Addressable form fields, used for single-field edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    StudentName,
    DateOfBirth,
    Grade,
    PreviousSchool,
    GuardianName,
    GuardianRelationship,
    GuardianPhone,
    GuardianEmail,
    Address,
    HasMedicalConditions,
    MedicalConditions,
    HasAllergies,
    Allergies,
    EmergencyContactName,
    EmergencyContactPhone,
    Notes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Flag(b)
    }
}

impl FormData {
    /// Writes one field. Text fields reject flag values and vice versa.
    pub fn set(&mut self, field: FormField, value: FieldValue) -> Result<()> {
        match (field, value) {
            (FormField::HasMedicalConditions, FieldValue::Flag(b)) => {
                self.has_medical_conditions = b;
            }
            (FormField::HasAllergies, FieldValue::Flag(b)) => self.has_allergies = b,
            (field, FieldValue::Text(s)) => match self.text_mut(field) {
                Some(slot) => *slot = s,
                None => return Err(mismatch(field)),
            },
            (field, FieldValue::Flag(_)) => return Err(mismatch(field)),
        }
        Ok(())
    }

    fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        let slot = match field {
            FormField::StudentName => &mut self.student_name,
            FormField::DateOfBirth => &mut self.date_of_birth,
            FormField::Grade => &mut self.grade,
            FormField::PreviousSchool => &mut self.previous_school,
            FormField::GuardianName => &mut self.guardian_name,
            FormField::GuardianRelationship => &mut self.guardian_relationship,
            FormField::GuardianPhone => &mut self.guardian_phone,
            FormField::GuardianEmail => &mut self.guardian_email,
            FormField::Address => &mut self.address,
            FormField::MedicalConditions => &mut self.medical_conditions,
            FormField::Allergies => &mut self.allergies,
            FormField::EmergencyContactName => &mut self.emergency_contact_name,
            FormField::EmergencyContactPhone => &mut self.emergency_contact_phone,
            FormField::Notes => &mut self.notes,
            FormField::HasMedicalConditions | FormField::HasAllergies => return None,
        };
        Some(slot)
    }
}

fn mismatch(field: FormField) -> Error {
    Error::BadRequest(format!("wrong value type for field {field:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        let mut p = Progress::default();
        assert_eq!(p.percentage(), 0);
        p.student_info = true;
        assert_eq!(p.percentage(), 33);
        p.guardian_info = true;
        assert_eq!(p.percentage(), 67);
        p.additional_info = true;
        assert_eq!(p.percentage(), 100);
        assert!(p.is_complete());
    }

    #[test]
    fn test_set_text_and_flag() {
        let mut form = FormData::default();
        form.set(FormField::Grade, "2".into()).unwrap();
        form.set(FormField::HasAllergies, true.into()).unwrap();
        assert_eq!(form.grade, "2");
        assert!(form.has_allergies);
    }

    #[test]
    fn test_set_rejects_mismatched_value() {
        let mut form = FormData::default();
        assert!(form.set(FormField::Grade, true.into()).is_err());
        assert!(form.set(FormField::HasAllergies, "yes".into()).is_err());
        assert_eq!(form, FormData::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let form: FormData =
            serde_json::from_str(r#"{"studentName":"Grace","grade":"2"}"#).unwrap();
        assert_eq!(form.student_name, "Grace");
        assert_eq!(form.guardian_email, "");
        assert!(!form.has_medical_conditions);
    }
}
