//! Minimal XML-RPC framing for the status query
//!
//! Only what the single `is_connected` query needs: reading the method name
//! of a `methodCall`, and boolean or fault responses.

use thiserror::Error;

/// Method answering whether a peer is connected
pub const IS_CONNECTED: &str = "is_connected";

/// Name under which existing monitoring scripts ask the same question
pub const LEGACY_IS_CONNECTED: &str = "is_dtniotsc_connected";

/// Fault code for an unknown method, as used by common XML-RPC servers
pub const FAULT_UNKNOWN_METHOD: i32 = 1;

/// Fault code for a request that is not a method call
pub const FAULT_MALFORMED: i32 = -32700;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Not an XML-RPC method call")]
    NotAMethodCall,

    #[error("Method call without method name")]
    MissingMethodName,

    #[error("Unexpected XML-RPC response: {0}")]
    UnexpectedResponse(String),

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i32, message: String },
}

/// Method name of a `methodCall` document
pub fn method_name(body: &str) -> Result<&str, RpcError> {
    if !body.contains("<methodCall>") {
        return Err(RpcError::NotAMethodCall);
    }
    element(body, "methodName")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(RpcError::MissingMethodName)
}

pub fn method_call(method: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodCall>\n<methodName>{}</methodName>\n<params>\n</params>\n</methodCall>\n",
        escape(method)
    )
}

pub fn boolean_response(value: bool) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse>\n<params>\n<param>\n<value><boolean>{}</boolean></value>\n</param>\n</params>\n</methodResponse>\n",
        u8::from(value)
    )
}

pub fn fault_response(code: i32, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse>\n<fault>\n<value><struct>\n\
         <member>\n<name>faultCode</name>\n<value><int>{}</int></value>\n</member>\n\
         <member>\n<name>faultString</name>\n<value><string>{}</string></value>\n</member>\n\
         </struct></value>\n</fault>\n</methodResponse>\n",
        code,
        escape(message)
    )
}

/// Decode a boolean `methodResponse`, turning faults into errors
pub fn parse_boolean_response(body: &str) -> Result<bool, RpcError> {
    if body.contains("<fault>") {
        let code = element(body, "int")
            .or_else(|| element(body, "i4"))
            .and_then(|c| c.trim().parse().ok())
            .unwrap_or(0);
        let message = element(body, "string").unwrap_or_default().to_string();
        return Err(RpcError::Fault { code, message });
    }

    match element(body, "boolean").map(str::trim) {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        _ => Err(RpcError::UnexpectedResponse(body.to_string())),
    }
}

/// Text between the first `<tag>` and the following `</tag>`
fn element<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(&body[start..end])
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_name_of_call() {
        let call = method_call(IS_CONNECTED);
        assert_eq!(method_name(&call), Ok(IS_CONNECTED));

        let python_style = "<?xml version='1.0'?>\n<methodCall>\n<methodName>is_dtniotsc_connected</methodName>\n<params>\n</params>\n</methodCall>\n";
        assert_eq!(method_name(python_style), Ok(LEGACY_IS_CONNECTED));
    }

    #[test]
    fn test_method_name_errors() {
        assert_eq!(method_name("hello"), Err(RpcError::NotAMethodCall));
        assert_eq!(
            method_name("<methodCall><methodName> </methodName></methodCall>"),
            Err(RpcError::MissingMethodName)
        );
    }

    #[test]
    fn test_boolean_response() {
        assert_eq!(parse_boolean_response(&boolean_response(true)), Ok(true));
        assert_eq!(parse_boolean_response(&boolean_response(false)), Ok(false));
        assert!(boolean_response(true).contains("<boolean>1</boolean>"));
    }

    #[test]
    fn test_fault_response() {
        let fault = fault_response(FAULT_UNKNOWN_METHOD, "method \"reboot\" is not supported");
        assert_eq!(
            parse_boolean_response(&fault),
            Err(RpcError::Fault {
                code: FAULT_UNKNOWN_METHOD,
                message: "method \"reboot\" is not supported".to_string(),
            })
        );
    }

    #[test]
    fn test_unexpected_response() {
        assert!(matches!(
            parse_boolean_response("<methodResponse></methodResponse>"),
            Err(RpcError::UnexpectedResponse(_))
        ));
    }
}
