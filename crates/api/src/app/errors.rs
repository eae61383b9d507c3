use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use oficina_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validacao", msg),
        DispatchError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "nao_encontrado", msg),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflito", msg),
        DispatchError::Concurrency(msg) => json_error(
            StatusCode::CONFLICT,
            "conflito",
            format!("registro alterado por outra operação, tente novamente ({msg})"),
        ),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "regra_violada", msg)
        }
        other @ (DispatchError::Deserialize(_) | DispatchError::Store(_) | DispatchError::Publish(_)) => {
            error!(error = %other, "request failed in the storage layer");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "erro_interno", "erro interno do servidor")
        }
    }
}

/// Error body shared by every endpoint: `{sucesso: false, erro, codigo}`.
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "sucesso": false,
            "erro": message.into(),
            "codigo": code,
        })),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validacao", message)
}

/// Body that failed to parse is a validation error in the common shape.
pub fn rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    bad_request(format!("corpo da requisição inválido: {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        let cases = [
            (DispatchError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DispatchError::not_found("x"), StatusCode::NOT_FOUND),
            (DispatchError::Conflict("x".into()), StatusCode::CONFLICT),
            (DispatchError::Concurrency("x".into()), StatusCode::CONFLICT),
            (DispatchError::InvariantViolation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DispatchError::Publish("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(dispatch_error_to_response(err).status(), status);
        }
    }
}
