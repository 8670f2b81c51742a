use http::HeaderMap;

/// Path prefixes excluded from request logging or tracing
#[derive(Clone, Debug)]
pub struct IgnoredPaths {
    pub prefixes: Vec<String>,
}

impl Default for IgnoredPaths {
    fn default() -> Self {
        Self {
            prefixes: vec!["/grpc.reflection.".to_string()],
        }
    }
}

impl IgnoredPaths {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Parse a comma-separated prefix list, ignoring blanks
    pub fn from_comma_separated(paths: &str) -> Self {
        Self::new(
            paths
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn contains(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

pub type GrpcLoggingConfig = IgnoredPaths;
pub type GrpcTracingConfig = IgnoredPaths;

/// Service and method of a gRPC request path such as
/// `/fleet.v1.FleetService/StreamTelemetry`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GrpcMethod {
    pub service: String,
    pub method: String,
}

impl GrpcMethod {
    pub(crate) fn from_path(path: &str) -> Self {
        match path.trim_start_matches('/').split_once('/') {
            Some((qualified, method)) => Self {
                service: qualified
                    .rsplit('.')
                    .next()
                    .unwrap_or(qualified)
                    .to_string(),
                method: method.to_string(),
            },
            None => Self {
                service: String::new(),
                method: path.trim_start_matches('/').to_string(),
            },
        }
    }
}

/// `grpc-status` from response headers.
///
/// Only present for unary calls and streams refused up front; an accepted
/// stream carries its status in trailers.
pub(crate) fn header_status(headers: &HeaderMap) -> Option<i32> {
    headers
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_default_ignores_reflection() {
        let ignored = IgnoredPaths::default();
        assert!(ignored.contains("/grpc.reflection.v1.ServerReflection/ServerReflectionInfo"));
        assert!(!ignored.contains("/fleet.v1.FleetService/StreamTelemetry"));
    }

    #[test]
    fn test_from_comma_separated() {
        let ignored = IgnoredPaths::from_comma_separated(" /grpc.health., ,/grpc.reflection.");
        assert_eq!(ignored.prefixes, vec!["/grpc.health.", "/grpc.reflection."]);
    }

    #[test]
    fn test_method_from_path() {
        let m = GrpcMethod::from_path("/fleet.v1.FleetService/StreamTelemetry");
        assert_eq!(m.service, "FleetService");
        assert_eq!(m.method, "StreamTelemetry");

        let unqualified = GrpcMethod::from_path("/Service/Method");
        assert_eq!(unqualified.service, "Service");

        let orphan = GrpcMethod::from_path("orphan");
        assert_eq!(orphan.service, "");
        assert_eq!(orphan.method, "orphan");
    }

    #[test]
    fn test_header_status() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_status(&headers), None);

        headers.insert("grpc-status", HeaderValue::from_static("16"));
        assert_eq!(header_status(&headers), Some(16));
    }
}
