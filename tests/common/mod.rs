//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::ast::Stmt;
use rox::error::Diagnostics;
use rox::parser::Parser;
use rox::scanner;
use rox::session::{RunError, Session};

/// In-memory writer the test keeps a handle to after handing a clone to the
/// interpreter.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session printing into a buffer the caller can inspect.
pub fn session() -> (Session, SharedBuffer) {
    let buffer = SharedBuffer::default();
    (Session::with_output(Box::new(buffer.clone())), buffer)
}

/// Runs `source` in a fresh session; returns printed lines and the outcome.
pub fn run(source: &str) -> (Vec<String>, Result<(), RunError>) {
    let (mut session, buffer) = session();
    let result = session.run(source);
    (buffer.lines(), result)
}

/// Runs `source`, panicking on any error, and returns the printed lines.
pub fn run_ok(source: &str) -> Vec<String> {
    let (lines, result) = run(source);
    if let Err(e) = result {
        panic!("program failed: {e}\noutput so far: {lines:?}");
    }
    lines
}

/// Scans and parses `source`, panicking on lexical errors.
pub fn parse(source: &str) -> (Vec<Stmt>, Diagnostics) {
    let (tokens, diagnostics) = scanner::scan(source);
    assert!(diagnostics.is_empty(), "lex errors: {diagnostics}");
    Parser::new(&tokens).parse()
}

/// Scans and parses `source`, panicking on any error.
pub fn parse_ok(source: &str) -> Vec<Stmt> {
    let (statements, diagnostics) = parse(source);
    assert!(diagnostics.is_empty(), "parse errors: {diagnostics}");
    statements
}
