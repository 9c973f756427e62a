// HTTP status codes produced or mapped by the dispatcher

use serde_json::{Value, json};

macro_rules! statuses {
    ($($name:ident = $code:literal, $reason:literal;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HttpStatus {
            $($name = $code,)+
        }

        impl HttpStatus {
            /// Reason phrase sent in generated error bodies
            pub fn reason(&self) -> &'static str {
                match self {
                    $(HttpStatus::$name => $reason,)+
                }
            }

            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(HttpStatus::$name),)+
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NoContent = 204, "No Content";
    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    Conflict = 409, "Conflict";
    UnprocessableEntity = 422, "Unprocessable Entity";
    TooManyRequests = 429, "Too Many Requests";
    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
    GatewayTimeout = 504, "Gateway Timeout";
}

impl HttpStatus {
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= 500
    }

    /// The fixed body the dispatcher sends for routing and internal
    /// failures: `{ "error": reason, "code": code }`.
    pub fn error_body(&self) -> Value {
        json!({ "error": self.reason(), "code": self.code() })
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_lookup() {
        assert_eq!(HttpStatus::NoContent.code(), 204);
        assert_eq!(u16::from(HttpStatus::MethodNotAllowed), 405);

        for status in [
            HttpStatus::Ok,
            HttpStatus::BadRequest,
            HttpStatus::NotFound,
            HttpStatus::GatewayTimeout,
        ] {
            assert_eq!(HttpStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(HttpStatus::from_code(299), None);
    }

    #[test]
    fn test_classification() {
        assert!(HttpStatus::Created.is_success());
        assert!(HttpStatus::NotFound.is_client_error());
        assert!(!HttpStatus::NotFound.is_server_error());
        assert!(HttpStatus::BadGateway.is_server_error());
    }

    #[test]
    fn test_error_body() {
        assert_eq!(
            HttpStatus::MethodNotAllowed.error_body(),
            json!({ "error": "Method Not Allowed", "code": 405 })
        );
        assert_eq!(HttpStatus::NotFound.to_string(), "404 Not Found");
    }
}
