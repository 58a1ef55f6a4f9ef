//! One-time authorization for the queue source.
//!
//! The strategy runs only when the credential slot is empty (or when the
//! operator forces a fresh grant). The engine never sees any of this; it is
//! handed a ready queue source.

use std::io::{BufRead, Write};

use reqwest::Url;
use tracing::info;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::store::Store;

/// OAuth endpoints of the queue source.
pub trait Authorizer {
    /// URL the operator opens to grant access.
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Trade an authorization code for a long-lived refresh credential.
    fn exchange_code(&self, code: &str) -> Result<String>;
}

/// Obtains a fresh refresh credential, usually with a human in the loop.
pub trait AuthStrategy {
    fn obtain(&mut self, authorizer: &dyn Authorizer) -> Result<String>;
}

/// Return the stored credential, running `strategy` and storing its result
/// when the slot is empty.
pub fn ensure_credential<St, S>(
    store: &mut St,
    authorizer: &dyn Authorizer,
    strategy: &mut S,
) -> Result<String>
where
    St: Store + ?Sized,
    S: AuthStrategy + ?Sized,
{
    if let Some(token) = store.get_credential()? {
        return Ok(token);
    }
    reauthorize(store, authorizer, strategy)
}

/// Run `strategy` unconditionally and overwrite the credential slot.
pub fn reauthorize<St, S>(
    store: &mut St,
    authorizer: &dyn Authorizer,
    strategy: &mut S,
) -> Result<String>
where
    St: Store + ?Sized,
    S: AuthStrategy + ?Sized,
{
    let token = strategy.obtain(authorizer)?;
    store.set_credential(&token)?;
    info!("stored new refresh credential");
    Ok(token)
}

// ---------------------------------------------------------------------------
// ConsolePrompt
// ---------------------------------------------------------------------------

/// Prints the authorization URL and reads the answer from a line of input.
///
/// The answer may be the bare code or the whole redirect URL. When a URL is
/// pasted its `state` must match the one that was sent.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> AuthStrategy for ConsolePrompt<R, W> {
    fn obtain(&mut self, authorizer: &dyn Authorizer) -> Result<String> {
        let state = Uuid::new_v4().simple().to_string();
        let url = authorizer.authorize_url(&state)?;

        writeln!(self.output, "Open this URL and approve access:\n\n  {url}\n")?;
        write!(self.output, "Paste the code (or the full redirect URL): ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(RelayError::Auth("no authorization code entered".into()));
        }
        let code = parse_answer(line.trim(), &state)?;
        authorizer.exchange_code(&code)
    }
}

fn parse_answer(answer: &str, expected_state: &str) -> Result<String> {
    if answer.is_empty() {
        return Err(RelayError::Auth("no authorization code entered".into()));
    }
    let Ok(url) = Url::parse(answer) else {
        return Ok(answer.to_string());
    };

    let mut code = None;
    let mut state = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => {
                return Err(RelayError::Auth(format!("authorization denied: {v}")));
            }
            _ => {}
        }
    }
    if state.as_deref() != Some(expected_state) {
        return Err(RelayError::Auth(
            "state in redirect URL does not match this authorization request".into(),
        ));
    }
    code.ok_or_else(|| RelayError::Auth("redirect URL has no code parameter".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RedbStore;
    use std::cell::RefCell;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Echoes `state` back through the URL and records exchanged codes.
    #[derive(Default)]
    struct FakeAuthorizer {
        last_state: RefCell<String>,
        exchanged: RefCell<Vec<String>>,
    }

    impl Authorizer for FakeAuthorizer {
        fn authorize_url(&self, state: &str) -> Result<String> {
            *self.last_state.borrow_mut() = state.to_string();
            Ok(format!("https://auth.example/authorize?state={state}"))
        }

        fn exchange_code(&self, code: &str) -> Result<String> {
            self.exchanged.borrow_mut().push(code.to_string());
            Ok(format!("refresh-for-{code}"))
        }
    }

    /// Answers with a redirect URL built from the state the authorizer saw.
    struct RedirectStrategy {
        state_override: Option<String>,
    }

    impl AuthStrategy for RedirectStrategy {
        fn obtain(&mut self, authorizer: &dyn Authorizer) -> Result<String> {
            let state = Uuid::new_v4().simple().to_string();
            authorizer.authorize_url(&state)?;
            let sent = self.state_override.clone().unwrap_or_else(|| state.clone());
            let code = parse_answer(
                &format!("https://example.com/cb?state={sent}&code=abc"),
                &state,
            )?;
            authorizer.exchange_code(&code)
        }
    }

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("auth.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn console_prompt_accepts_bare_code() {
        let authorizer = FakeAuthorizer::default();
        let mut out = Vec::new();
        let mut prompt = ConsolePrompt::new(Cursor::new("xyz\n"), &mut out);

        let token = prompt.obtain(&authorizer).unwrap();

        assert_eq!(token, "refresh-for-xyz");
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("https://auth.example/authorize?state="));
        assert!(printed.contains(authorizer.last_state.borrow().as_str()));
    }

    #[test]
    fn console_prompt_rejects_empty_input() {
        let authorizer = FakeAuthorizer::default();
        let mut prompt = ConsolePrompt::new(Cursor::new(""), Vec::new());
        let err = prompt.obtain(&authorizer).unwrap_err();
        assert!(matches!(err, RelayError::Auth(_)), "{err:?}");
        assert!(authorizer.exchanged.borrow().is_empty());
    }

    #[test]
    fn redirect_url_with_matching_state_yields_code() {
        let code = parse_answer("https://example.com/cb?state=s1&code=c1", "s1").unwrap();
        assert_eq!(code, "c1");
    }

    #[test]
    fn redirect_url_with_wrong_state_is_rejected() {
        let authorizer = FakeAuthorizer::default();
        let mut strategy = RedirectStrategy {
            state_override: Some("forged".into()),
        };
        let err = strategy.obtain(&authorizer).unwrap_err();
        assert!(matches!(err, RelayError::Auth(ref m) if m.contains("state")), "{err:?}");
        assert!(authorizer.exchanged.borrow().is_empty());
    }

    #[test]
    fn redirect_url_with_error_is_reported() {
        let err = parse_answer("https://example.com/cb?state=s1&error=access_denied", "s1")
            .unwrap_err();
        assert!(matches!(err, RelayError::Auth(ref m) if m.contains("access_denied")), "{err:?}");
    }

    #[test]
    fn ensure_credential_prompts_only_when_slot_is_empty() {
        let (_dir, mut store) = open_tmp();
        let authorizer = FakeAuthorizer::default();
        let mut strategy = RedirectStrategy {
            state_override: None,
        };

        let first = ensure_credential(&mut store, &authorizer, &mut strategy).unwrap();
        let second = ensure_credential(&mut store, &authorizer, &mut strategy).unwrap();

        assert_eq!(first, "refresh-for-abc");
        assert_eq!(second, first);
        assert_eq!(authorizer.exchanged.borrow().len(), 1);
        assert_eq!(store.get_credential().unwrap().as_deref(), Some("refresh-for-abc"));
    }

    #[test]
    fn reauthorize_overwrites_existing_credential() {
        let (_dir, mut store) = open_tmp();
        store.set_credential("old").unwrap();
        let authorizer = FakeAuthorizer::default();
        let mut prompt = ConsolePrompt::new(Cursor::new("fresh\n"), Vec::new());

        let token = reauthorize(&mut store, &authorizer, &mut prompt).unwrap();

        assert_eq!(token, "refresh-for-fresh");
        assert_eq!(store.get_credential().unwrap().as_deref(), Some("refresh-for-fresh"));
    }
}
