//! HR request data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of document or help a collaborator asks HR for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestKind {
    #[serde(rename = "Constancia")]
    Certificate,
    #[serde(rename = "Referencia")]
    Reference,
    #[serde(rename = "Consulta")]
    Inquiry,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [Self::Certificate, Self::Reference, Self::Inquiry];
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Certificate => "Constancia",
            Self::Reference => "Referencia",
            Self::Inquiry => "Consulta",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "constancia" | "certificate" => Ok(Self::Certificate),
            "referencia" | "reference" => Ok(Self::Reference),
            "consulta" | "inquiry" => Ok(Self::Inquiry),
            other => Err(format!("unknown request kind: {other}")),
        }
    }
}

/// Processing status, owned by HR. New requests are always `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RequestStatus {
    #[default]
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En Proceso")]
    InProgress,
    #[serde(rename = "Completado")]
    Completed,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pendiente",
            Self::InProgress => "En Proceso",
            Self::Completed => "Completado",
        };
        write!(f, "{s}")
    }
}

/// A stored HR request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: String,
    #[serde(rename = "colaborador_id")]
    pub user_id: String,
    #[serde(rename = "empresa_id")]
    pub organization_id: String,
    #[serde(rename = "tipo")]
    pub kind: RequestKind,
    #[serde(rename = "estatus", default)]
    pub status: RequestStatus,
    #[serde(rename = "detalles", default)]
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A request about to be appended; the store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewRequest {
    #[serde(rename = "colaborador_id")]
    pub user_id: String,
    #[serde(rename = "empresa_id")]
    pub organization_id: String,
    #[serde(rename = "tipo")]
    pub kind: RequestKind,
    #[serde(rename = "estatus")]
    pub status: RequestStatus,
    #[serde(rename = "detalles")]
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_both_languages() {
        assert_eq!("Constancia".parse::<RequestKind>(), Ok(RequestKind::Certificate));
        assert_eq!("inquiry".parse::<RequestKind>(), Ok(RequestKind::Inquiry));
        assert!("vacaciones".parse::<RequestKind>().is_err());
    }

    #[test]
    fn display_matches_serde() {
        for kind in RequestKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(format!("\"{kind}\""), json);
        }
        for status in [
            RequestStatus::Pending,
            RequestStatus::InProgress,
            RequestStatus::Completed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
        }
    }

    #[test]
    fn request_row_deserializes_without_optional_columns() {
        let row = serde_json::json!({
            "id": "101",
            "colaborador_id": "user-123",
            "empresa_id": "org-1",
            "tipo": "Referencia",
            "created_at": "2024-01-15T00:00:00Z"
        });
        let req: Request = serde_json::from_value(row).unwrap();
        assert_eq!(req.kind, RequestKind::Reference);
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.details.is_none());
    }
}
