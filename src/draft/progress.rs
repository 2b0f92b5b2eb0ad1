use crate::types::{FormData, Progress};

fn filled(values: &[&str]) -> bool {
    values.iter().all(|v| !v.is_empty())
}

/// Derives section completion from the form. This is the only way a
/// [`Progress`] should be produced for persistence.
#[must_use]
pub fn compute_progress(form: &FormData) -> Progress {
    Progress {
        student_info: filled(&[&form.student_name, &form.date_of_birth, &form.grade]),
        guardian_info: filled(&[
            &form.guardian_name,
            &form.guardian_phone,
            &form.guardian_email,
            &form.address,
        ]),
        additional_info: filled(&[&form.emergency_contact_name, &form.emergency_contact_phone]),
    }
}
