use crate::server::response::ApiError;
use crate::types::FormData;

const MAX_EMAIL_LEN: usize = 254;
const MAX_FIELD_LEN: usize = 200;
const MAX_FREE_TEXT_LEN: usize = 4000;

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request(format!(
            "Email cannot exceed {MAX_EMAIL_LEN} characters"
        )));
    }
    if email.contains(char::is_whitespace) {
        return Err(ApiError::bad_request("Email cannot contain whitespace"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("Email must look like name@domain.tld")),
    }
}

/// Drafts are saved mid-edit, so only sizes are checked here; content rules
/// belong to submission.
pub fn validate_form(form: &FormData) -> Result<(), ApiError> {
    let short_fields = [
        ("studentName", &form.student_name),
        ("dateOfBirth", &form.date_of_birth),
        ("grade", &form.grade),
        ("previousSchool", &form.previous_school),
        ("guardianName", &form.guardian_name),
        ("guardianRelationship", &form.guardian_relationship),
        ("guardianPhone", &form.guardian_phone),
        ("guardianEmail", &form.guardian_email),
        ("address", &form.address),
        ("emergencyContactName", &form.emergency_contact_name),
        ("emergencyContactPhone", &form.emergency_contact_phone),
    ];
    for (name, value) in short_fields {
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(ApiError::bad_request(format!(
                "{name} cannot exceed {MAX_FIELD_LEN} characters"
            )));
        }
    }

    let free_text = [
        ("medicalConditions", &form.medical_conditions),
        ("allergies", &form.allergies),
        ("notes", &form.notes),
    ];
    for (name, value) in free_text {
        if value.chars().count() > MAX_FREE_TEXT_LEN {
            return Err(ApiError::bad_request(format!(
                "{name} cannot exceed {MAX_FREE_TEXT_LEN} characters"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("parent@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_form_limits() {
        let mut form = FormData::default();
        assert!(validate_form(&form).is_ok());

        form.notes = "x".repeat(MAX_FREE_TEXT_LEN);
        assert!(validate_form(&form).is_ok());

        form.grade = "x".repeat(MAX_FIELD_LEN + 1);
        let err = validate_form(&form).unwrap_err();
        assert!(err.message.contains("grade"));
    }
}
