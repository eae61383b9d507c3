use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failures surfaced to the presentation layer. None are retried.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected input or a broken business rule (400/422).
    #[error("{message}")]
    Validation { code: String, message: String },

    #[error("{message}")]
    NotFound { message: String },

    /// Missing, expired or revoked session (401).
    #[error("{message}")]
    Unauthenticated { message: String },

    /// Authenticated but not allowed (403).
    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("erro no servidor ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("falha de comunicação: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("outra operação já está em andamento")]
    Busy,
}

/// `{sucesso:false, erro, codigo}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub erro: String,
    #[serde(default)]
    pub codigo: String,
}

impl ClientError {
    pub(crate) fn from_status(status: StatusCode, body: Option<ErrorBody>) -> Self {
        let (message, code) = match body {
            Some(body) => (body.erro, body.codigo),
            None => (
                status.canonical_reason().unwrap_or("erro desconhecido").to_string(),
                String::new(),
            ),
        };

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation { code, message },
            StatusCode::NOT_FOUND => ClientError::NotFound { message },
            StatusCode::UNAUTHORIZED => ClientError::Unauthenticated { message },
            StatusCode::FORBIDDEN => ClientError::Forbidden { message },
            StatusCode::CONFLICT => ClientError::Conflict { message },
            other => ClientError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    /// 401 or 403.
    pub fn is_authorization(&self) -> bool {
        matches!(self, ClientError::Unauthenticated { .. } | ClientError::Forbidden { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(codigo: &str) -> Option<ErrorBody> {
        Some(ErrorBody {
            erro: "mensagem do servidor".to_string(),
            codigo: codigo.to_string(),
        })
    }

    #[test]
    fn statuses_map_onto_the_taxonomy() {
        let err = ClientError::from_status(StatusCode::BAD_REQUEST, body("validacao"));
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "mensagem do servidor");

        let err = ClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body("regra_violada"));
        assert!(matches!(err, ClientError::Validation { ref code, .. } if code == "regra_violada"));

        assert!(ClientError::from_status(StatusCode::NOT_FOUND, body("nao_encontrado")).is_not_found());
        assert!(ClientError::from_status(StatusCode::UNAUTHORIZED, None).is_authorization());
        assert!(ClientError::from_status(StatusCode::FORBIDDEN, None).is_authorization());
        assert!(matches!(
            ClientError::from_status(StatusCode::CONFLICT, None),
            ClientError::Conflict { .. }
        ));
    }

    #[test]
    fn unexpected_statuses_are_server_errors() {
        let err = ClientError::from_status(StatusCode::BAD_GATEWAY, None);
        assert!(matches!(err, ClientError::Server { status: 502, ref message } if message == "Bad Gateway"));
    }
}
