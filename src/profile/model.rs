//! Profile, organization and onboarding data models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::backend::Session;
use crate::error::GateError;

/// Portal role of a collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Role {
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "RH")]
    Hr,
    #[default]
    #[serde(rename = "Colaborador")]
    Collaborator,
    #[serde(rename = "Ceo RH")]
    CeoHr,
    #[serde(rename = "Ceo Cliente")]
    CeoClient,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "Admin",
            Self::Hr => "RH",
            Self::Collaborator => "Colaborador",
            Self::CeoHr => "Ceo RH",
            Self::CeoClient => "Ceo Cliente",
        };
        write!(f, "{s}")
    }
}

/// An entry of the organization directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
}

impl Organization {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Application-level record completing a session's identity.
///
/// Keyed by the session identity: `id` always equals `Session::user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "empresa_id")]
    pub organization_id: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(rename = "rol_puesto", default)]
    pub job_title: Option<String>,
    #[serde(rename = "fecha_ingreso", default)]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "tipo_identificacion", default)]
    pub id_type: Option<String>,
    #[serde(rename = "numero_identificacion", default)]
    pub id_number: Option<String>,
    #[serde(rename = "correo_personal", default)]
    pub personal_email: Option<String>,
    #[serde(rename = "telefono_whatsapp", default)]
    pub whatsapp_phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Build the profile inserted at the end of onboarding.
    pub fn from_draft(session: &Session, draft: ProfileDraft) -> Self {
        Self {
            id: session.user_id.clone(),
            email: session.email.clone(),
            full_name: draft.full_name.trim().to_string(),
            role: Role::default(),
            organization_id: draft.organization_id.trim().to_string(),
            area: non_blank(draft.area),
            job_title: non_blank(draft.job_title),
            start_date: draft.start_date,
            id_type: draft.id_type.and_then(non_blank),
            id_number: draft.id_number.and_then(non_blank),
            personal_email: draft.personal_email.and_then(non_blank),
            whatsapp_phone: draft.whatsapp_phone.and_then(non_blank),
            avatar_url: None,
        }
    }

    /// Name shown in greetings; falls back to the generic collaborator label.
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if name.is_empty() { "Colaborador" } else { name }
    }

    /// First word of the name, as used in the dashboard greeting.
    pub fn first_name(&self) -> &str {
        self.display_name()
            .split_whitespace()
            .next()
            .unwrap_or("Colaborador")
    }

    /// Time since `start_date` as of `today`. `None` without a start date
    /// or when it lies in the future.
    pub fn tenure(&self, today: NaiveDate) -> Option<Tenure> {
        Tenure::between(self.start_date?, today)
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(ref v) = patch.full_name {
            self.full_name = v.trim().to_string();
        }
        if let Some(ref v) = patch.organization_id {
            self.organization_id = v.trim().to_string();
        }
        if let Some(ref v) = patch.area {
            self.area = non_blank(v.clone());
        }
        if let Some(ref v) = patch.job_title {
            self.job_title = non_blank(v.clone());
        }
        if let Some(v) = patch.start_date {
            self.start_date = Some(v);
        }
        if let Some(ref v) = patch.id_type {
            self.id_type = non_blank(v.clone());
        }
        if let Some(ref v) = patch.id_number {
            self.id_number = non_blank(v.clone());
        }
        if let Some(ref v) = patch.personal_email {
            self.personal_email = non_blank(v.clone());
        }
        if let Some(ref v) = patch.whatsapp_phone {
            self.whatsapp_phone = non_blank(v.clone());
        }
        if let Some(ref v) = patch.avatar_url {
            self.avatar_url = non_blank(v.clone());
        }
    }
}

/// Whole years and months a collaborator has been with the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenure {
    pub years: u32,
    pub months: u32,
}

impl Tenure {
    pub fn between(start: NaiveDate, today: NaiveDate) -> Option<Self> {
        if start > today {
            return None;
        }
        let mut months = (today.year() - start.year()) * 12 + today.month() as i32
            - start.month() as i32;
        if today.day() < start.day() {
            months -= 1;
        }
        let months = u32::try_from(months).ok()?;
        Some(Self {
            years: months / 12,
            months: months % 12,
        })
    }
}

impl std::fmt::Display for Tenure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = |n: u32, one: &str, many: &str| {
            format!("{n} {}", if n == 1 { one } else { many })
        };
        match (self.years, self.months) {
            (0, 0) => write!(f, "menos de un mes"),
            (0, m) => write!(f, "{}", unit(m, "mes", "meses")),
            (y, 0) => write!(f, "{}", unit(y, "año", "años")),
            (y, m) => write!(f, "{} y {}", unit(y, "año", "años"), unit(m, "mes", "meses")),
        }
    }
}

/// Content of the onboarding form.
///
/// `organization_id` must come from a directory search result; a free-typed
/// company name is not a valid reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub full_name: String,
    pub organization_id: String,
    pub area: String,
    pub job_title: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub id_type: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub personal_email: Option<String>,
    #[serde(default)]
    pub whatsapp_phone: Option<String>,
}

impl ProfileDraft {
    /// Check the submission preconditions. Performs no I/O.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.organization_id.trim().is_empty() {
            return Err(GateError::validation(
                "organization must be selected from the directory",
            ));
        }
        if self.full_name.trim().is_empty() {
            return Err(GateError::validation("full name is required"));
        }
        Ok(())
    }
}

/// Partial profile update. Identity, email and role are not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "empresa_id", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(rename = "rol_puesto", skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(rename = "fecha_ingreso", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "tipo_identificacion", skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    #[serde(rename = "numero_identificacion", skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(rename = "correo_personal", skip_serializing_if = "Option::is_none")]
    pub personal_email: Option<String>,
    #[serde(rename = "telefono_whatsapp", skip_serializing_if = "Option::is_none")]
    pub whatsapp_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reject empty patches and patches that blank a required field.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.is_empty() {
            return Err(GateError::validation("nothing to update"));
        }
        if matches!(self.full_name.as_deref(), Some(v) if v.trim().is_empty()) {
            return Err(GateError::validation("full name cannot be blank"));
        }
        if matches!(self.organization_id.as_deref(), Some(v) if v.trim().is_empty()) {
            return Err(GateError::validation("organization cannot be blank"));
        }
        Ok(())
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("user-7", "ana@empresa.com", "token")
    }

    #[test]
    fn draft_without_organization_is_rejected() {
        let draft = ProfileDraft {
            full_name: "Ana".into(),
            organization_id: "   ".into(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(GateError::Validation(_))));
    }

    #[test]
    fn profile_from_draft_is_keyed_by_session() {
        let draft = ProfileDraft {
            full_name: " Ana García ".into(),
            organization_id: "org-42".into(),
            area: "Engineering".into(),
            job_title: "".into(),
            ..Default::default()
        };
        let profile = Profile::from_draft(&session(), draft);
        assert_eq!(profile.id, "user-7");
        assert_eq!(profile.email, "ana@empresa.com");
        assert_eq!(profile.full_name, "Ana García");
        assert_eq!(profile.role, Role::Collaborator);
        assert_eq!(profile.area.as_deref(), Some("Engineering"));
        assert!(profile.job_title.is_none());
    }

    #[test]
    fn patch_validation() {
        assert!(ProfilePatch::default().validate().is_err());

        let blank_name = ProfilePatch {
            full_name: Some(" ".into()),
            ..Default::default()
        };
        assert!(blank_name.validate().is_err());

        let ok = ProfilePatch {
            area: Some("Finanzas".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn patch_apply_only_touches_given_fields() {
        let mut profile = Profile::from_draft(
            &session(),
            ProfileDraft {
                full_name: "Ana".into(),
                organization_id: "org-1".into(),
                area: "Producto".into(),
                job_title: "Analista".into(),
                ..Default::default()
            },
        );
        profile.apply(&ProfilePatch {
            job_title: Some("Líder".into()),
            whatsapp_phone: Some("+57 300".into()),
            ..Default::default()
        });
        assert_eq!(profile.job_title.as_deref(), Some("Líder"));
        assert_eq!(profile.whatsapp_phone.as_deref(), Some("+57 300"));
        assert_eq!(profile.area.as_deref(), Some("Producto"));
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ProfilePatch {
            job_title: Some("Líder".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "rol_puesto": "Líder" }));
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Hr).unwrap(), "\"RH\"");
        let role: Role = serde_json::from_str("\"Ceo Cliente\"").unwrap();
        assert_eq!(role, Role::CeoClient);
        assert_eq!(Role::CeoHr.to_string(), "Ceo RH");
    }

    #[test]
    fn display_name_falls_back() {
        let mut profile = Profile::from_draft(
            &session(),
            ProfileDraft {
                full_name: "Ana".into(),
                organization_id: "org-1".into(),
                ..Default::default()
            },
        );
        assert_eq!(profile.display_name(), "Ana");
        profile.full_name.clear();
        assert_eq!(profile.display_name(), "Colaborador");
    }

    #[test]
    fn tenure_counts_whole_months() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 15).unwrap();
        let on = |y, m, d| Tenure::between(start, NaiveDate::from_ymd_opt(y, m, d).unwrap());

        assert_eq!(on(2022, 3, 15), Some(Tenure { years: 0, months: 0 }));
        assert_eq!(on(2022, 4, 14), Some(Tenure { years: 0, months: 0 }));
        assert_eq!(on(2022, 4, 15), Some(Tenure { years: 0, months: 1 }));
        assert_eq!(on(2024, 10, 20), Some(Tenure { years: 2, months: 7 }));
        assert_eq!(on(2025, 3, 14), Some(Tenure { years: 2, months: 11 }));
        assert_eq!(on(2022, 3, 1), None);
    }

    #[test]
    fn tenure_reads_naturally() {
        let t = |years, months| Tenure { years, months }.to_string();
        assert_eq!(t(0, 0), "menos de un mes");
        assert_eq!(t(0, 1), "1 mes");
        assert_eq!(t(1, 0), "1 año");
        assert_eq!(t(2, 7), "2 años y 7 meses");
    }

    #[test]
    fn greeting_uses_first_name() {
        let mut profile = Profile::from_draft(
            &Session::new("u1", "ana@empresa.com", "t"),
            ProfileDraft {
                full_name: "  Ana María García ".into(),
                organization_id: "org-1".into(),
                ..Default::default()
            },
        );
        assert_eq!(profile.first_name(), "Ana");
        assert!(profile.tenure(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).is_none());

        profile.full_name = String::new();
        assert_eq!(profile.first_name(), "Colaborador");
    }
}
