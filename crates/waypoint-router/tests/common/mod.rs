#![allow(dead_code)]

use waypoint_router::{
    handler, Args, CompiledPattern, Handler, Method, Request, Response, RouteTable, RouterError,
};

pub fn compile(template: &str) -> CompiledPattern {
    CompiledPattern::compile(template)
        .unwrap_or_else(|e| panic!("Failed to compile: {template}\nError: {e:?}"))
}

pub fn compile_err(template: &str) -> RouterError {
    CompiledPattern::compile(template)
        .expect_err(&format!("Expected compile error for: {template}"))
}

/// A handler that answers with its tag, the bound `request.params` and the
/// positional arguments, e.g. `show|uid=42|42`.
pub fn tagged(tag: &'static str) -> Handler {
    handler(move |req: Request, res: Response, args: Args| async move {
        let mut params: Vec<String> = req
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        params.sort();
        let args: Vec<&str> = args.iter().map(|a| a.unwrap_or("null")).collect();
        res.body(format!("{tag}|{}|{}", params.join("&"), args.join(",")))
    })
}

pub fn table(routes: &[(Method, &str, &'static str)]) -> RouteTable {
    routes
        .iter()
        .fold(RouteTable::new(), |table, (method, pattern, tag)| {
            table
                .add_route(*method, pattern, tagged(*tag))
                .unwrap_or_else(|e| panic!("Failed to register {pattern}: {e}"))
        })
}
