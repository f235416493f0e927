use std::sync::Arc;
use std::thread;

use state_guard::{
    Config, ErrorCode, FormUrlProcessor, Legality, LinkUrlProcessor, MemorySession, Method,
    RequestContext, RequestContextBuilder, SessionStore, StateGuard, StateScopeType, StateToken,
    ValidationOutcome, ViolationKind,
};

const STATE: &str = "_STATE_ID_";

fn new_session() -> Arc<dyn SessionStore> {
    Arc::new(MemorySession::new())
}

fn request(session: &Arc<dyn SessionStore>, target: &str) -> RequestContextBuilder {
    RequestContext::builder(Arc::clone(session)).target(target)
}

/// Renders the response to `ctx` as a page holding `links`.
fn render_links(guard: &StateGuard, ctx: &RequestContext, links: &[&str]) -> Vec<String> {
    let mut composer = guard.composer(ctx);
    composer.start_page().unwrap();
    let processed = links
        .iter()
        .map(|link| LinkUrlProcessor.process_url(&mut composer, link).unwrap())
        .collect();
    composer.end_page().unwrap();
    processed
}

fn render_from(guard: &StateGuard, session: &Arc<dyn SessionStore>, from: &str, link: &str) -> String {
    let ctx = request(session, from).build();
    render_links(guard, &ctx, &[link]).remove(0)
}

/// Issues a GET request for a rendered link.
fn follow(guard: &StateGuard, session: &Arc<dyn SessionStore>, url: &str) -> ValidationOutcome {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let ctx = request(session, path).query(query).build();
    guard.validate(&ctx).unwrap()
}

fn token_of(url: &str) -> String {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("_STATE_ID_="))
        .map(|t| t.split('#').next().unwrap_or(t).to_string())
        .expect("url carries a state token")
}

fn only_error(outcome: &ValidationOutcome) -> (ViolationKind, ErrorCode) {
    assert_eq!(outcome.errors().len(), 1, "errors: {:?}", outcome.errors());
    let error = &outcome.errors()[0];
    (error.kind(), error.code())
}

// ---------------------------------------------------------------------------
// Confidentiality
// ---------------------------------------------------------------------------

#[test]
fn confidential_value_is_substituted_and_restored() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let ctx = request(&session, "/index.do").build();

    let mut composer = guard.composer(&ctx);
    composer.start_page().unwrap();
    composer.begin_request(Some(Method::Get), "/testAction.do").unwrap();
    assert_eq!(composer.compose("param", "value", false).unwrap(), "0");
    let token = composer.end_request().unwrap();
    composer.end_page().unwrap();

    let ok = guard
        .validate(&request(&session, "/testAction.do").param("param", "0").param(STATE, &token).build())
        .unwrap();
    assert!(ok.is_fully_valid());
    assert_eq!(ok.restored_parameter("param"), Some(&["value".to_string()][..]));

    let tampered = guard
        .validate(&request(&session, "/testAction.do").param("param", "1").param(STATE, &token).build())
        .unwrap();
    assert_eq!(tampered.legality(), Legality::Invalid);
    assert_eq!(
        only_error(&tampered),
        (ViolationKind::ParameterTampering, ErrorCode::InvalidConfidentialParameter)
    );
    assert_eq!(tampered.errors()[0].parameter(), Some("param"));
    assert_eq!(tampered.errors()[0].value(), Some("1"));
}

#[test]
fn plain_values_must_match_a_recorded_value() {
    let guard = StateGuard::new(Config::builder().confidentiality(false).build().unwrap());
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/testAction.do?param=value");
    assert!(link.starts_with("/testAction.do?param=value&_STATE_ID_="));

    assert!(follow(&guard, &session, &link).is_fully_valid());

    let tampered = follow(&guard, &session, &link.replace("param=value", "param=other"));
    assert_eq!(
        only_error(&tampered),
        (ViolationKind::ParameterTampering, ErrorCode::InvalidParameterValue)
    );
    assert_eq!(tampered.errors()[0].original_value(), Some("value"));
}

#[test]
fn multi_valued_parameters_keep_their_indices() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let ctx = request(&session, "/index.do").build();

    let mut composer = guard.composer(&ctx);
    composer.start_page().unwrap();
    composer.begin_request(Some(Method::Post), "/pick.do").unwrap();
    let rendered: Vec<String> = ["red", "green", "blue"]
        .iter()
        .map(|v| composer.compose_form_field("color", v, false, "select").unwrap())
        .collect();
    let token = composer.end_request().unwrap();
    composer.end_page().unwrap();
    assert_eq!(rendered, ["0", "1", "2"]);

    let outcome = guard
        .validate(
            &request(&session, "/pick.do")
                .method(Method::Post)
                .param("color", "2")
                .param("color", "0")
                .param(STATE, &token)
                .build(),
        )
        .unwrap();
    assert!(outcome.is_fully_valid());
    assert_eq!(
        outcome.restored_parameter("color"),
        Some(&["blue".to_string(), "red".to_string()][..])
    );
}

// ---------------------------------------------------------------------------
// State token
// ---------------------------------------------------------------------------

#[test]
fn missing_token_is_rejected() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();

    let outcome = guard
        .validate(&request(&session, "/testAction.do").param("param", "0").build())
        .unwrap();
    assert_eq!(
        only_error(&outcome),
        (ViolationKind::RequiredParameterMissing, ErrorCode::RequiredStateParam)
    );
    assert!(outcome.restored_parameters().is_empty());
}

#[test]
fn parameterless_request_passes_when_configured() {
    let guard = StateGuard::new(
        Config::builder()
            .avoid_validation_in_urls_without_params(true)
            .build()
            .unwrap(),
    );
    let session = new_session();

    assert_eq!(
        render_from(&guard, &session, "/index.do", "/about.do"),
        "/about.do"
    );
    assert!(follow(&guard, &session, "/about.do").is_fully_valid());
    assert!(!follow(&guard, &session, "/about.do?x=1").is_valid());
}

#[test]
fn malformed_token_is_rejected() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();

    let outcome = follow(&guard, &session, "/a.do?_STATE_ID_=garbage");
    assert_eq!(
        only_error(&outcome),
        (ViolationKind::InvalidStateToken, ErrorCode::InvalidParameterValue)
    );
    assert_eq!(outcome.errors()[0].value(), Some("garbage"));
}

#[test]
fn altered_hash_is_rejected() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/a.do?x=1");
    let token = token_of(&link);

    let last = token.chars().last().unwrap();
    let forged = format!("{}{}", &token[..token.len() - 1], if last == '0' { '1' } else { '0' });
    let outcome = follow(&guard, &session, &link.replace(&token, &forged));

    assert_eq!(
        only_error(&outcome),
        (ViolationKind::InvalidStateToken, ErrorCode::InvalidParameterValue)
    );
}

#[test]
fn unknown_page_and_unknown_state_are_distinguished() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/a.do?x=1");
    let token: StateToken = token_of(&link).parse().unwrap();

    let unknown_page = format!("/a.do?x=0&_STATE_ID_=999-0-{}", token.hash());
    assert_eq!(
        only_error(&follow(&guard, &session, &unknown_page)),
        (ViolationKind::InvalidPageOrState, ErrorCode::InvalidPageId)
    );

    let page_id = token.page_id().unwrap();
    let unknown_state = format!("/a.do?x=0&_STATE_ID_={}-7-{}", page_id, token.hash());
    assert_eq!(
        only_error(&follow(&guard, &session, &unknown_state)),
        (ViolationKind::InvalidPageOrState, ErrorCode::InvalidParameterValue)
    );
}

#[test]
fn tokens_do_not_cross_sessions() {
    let guard = StateGuard::new(Config::default());
    let alice = new_session();
    let mallory = new_session();
    let link = render_from(&guard, &alice, "/index.do", "/transfer.do?to=savings");

    let outcome = follow(&guard, &mallory, &link);
    assert!(!outcome.is_valid());
    assert_eq!(outcome.first_error().unwrap().kind(), ViolationKind::InvalidPageOrState);
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[test]
fn token_is_bound_to_its_action() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/a.do?x=1");

    let outcome = follow(&guard, &session, &link.replacen("/a.do", "/b.do", 1));
    assert_eq!(
        only_error(&outcome),
        (ViolationKind::ActionMismatch, ErrorCode::InvalidAction)
    );
    assert_eq!(outcome.errors()[0].original_value(), Some("/a.do"));

    // trailing slash is not a different action
    assert!(follow(&guard, &session, &link.replacen("/a.do", "/a.do/", 1)).is_fully_valid());
}

#[test]
fn token_is_bound_to_its_method() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let ctx = request(&session, "/edit.do").build();

    let mut composer = guard.composer(&ctx);
    composer.start_page().unwrap();
    FormUrlProcessor
        .process_action(&mut composer, "/save.do", Method::Post)
        .unwrap();
    let token = composer.end_request().unwrap();
    composer.end_page().unwrap();

    let as_get = guard
        .validate(&request(&session, "/save.do").param(STATE, &token).build())
        .unwrap();
    assert_eq!(
        only_error(&as_get),
        (ViolationKind::ActionMismatch, ErrorCode::InvalidAction)
    );

    let as_post = guard
        .validate(
            &request(&session, "/save.do")
                .method(Method::Post)
                .param(STATE, &token)
                .build(),
        )
        .unwrap();
    assert!(as_post.is_fully_valid());
}

#[test]
fn context_path_is_ignored_when_matching_actions() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let ctx = request(&session, "/shop/index.do").context_path("/shop").build();
    let link = render_links(&guard, &ctx, &["/shop/cart.do?item=3"]).remove(0);

    let (path, query) = link.split_once('?').unwrap();
    let follow_up = request(&session, path).context_path("/shop").query(query).build();
    assert!(guard.validate(&follow_up).unwrap().is_fully_valid());
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[test]
fn unexpected_parameter_is_rejected_unless_allowed() {
    let strict = StateGuard::new(Config::default());
    let session = new_session();
    let link = render_from(&strict, &session, "/index.do", "/a.do?x=1");

    let outcome = follow(&strict, &session, &format!("{link}&admin=true"));
    assert_eq!(
        only_error(&outcome),
        (ViolationKind::ParameterTampering, ErrorCode::InvalidParameterValue)
    );
    assert_eq!(outcome.errors()[0].parameter(), Some("admin"));

    let lenient = StateGuard::new(Config::builder().allow_extra_parameters("/a\\.do").build().unwrap());
    let session = new_session();
    let link = render_from(&lenient, &session, "/index.do", "/a.do?x=1");
    let outcome = follow(&lenient, &session, &format!("{link}&admin=true"));
    assert!(outcome.is_fully_valid());
    assert_eq!(outcome.restored_parameter("admin"), Some(&["true".to_string()][..]));
}

#[test]
fn exempt_and_start_parameters_are_not_validated() {
    let guard = StateGuard::new(
        Config::builder()
            .parameters_without_validation("/search\\.do", ["q"])
            .start_parameter("lang")
            .build()
            .unwrap(),
    );
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/search.do?q=rust&page=1");
    assert!(link.starts_with("/search.do?q=rust&page=0&"));

    let outcome = follow(&guard, &session, &format!("{}&lang=de", link.replace("q=rust", "q=tokio")));
    assert!(outcome.is_fully_valid());
    assert_eq!(outcome.restored_parameter("q"), Some(&["tokio".to_string()][..]));
    assert_eq!(outcome.restored_parameter("page"), Some(&["1".to_string()][..]));
    assert_eq!(outcome.restored_parameter("lang"), Some(&["de".to_string()][..]));
}

#[test]
fn exempt_parameters_round_trip_under_a_context_path() {
    let guard = StateGuard::new(
        Config::builder()
            .parameters_without_validation("/search\\.do", ["q"])
            .build()
            .unwrap(),
    );
    let session = new_session();
    let ctx = request(&session, "/app/index.do").context_path("/app").build();
    let link = render_links(&guard, &ctx, &["/app/search.do?q=shoes"]).remove(0);
    assert!(link.starts_with("/app/search.do?q=shoes&"));

    let (path, query) = link.split_once('?').unwrap();
    let outcome = guard
        .validate(&request(&session, path).context_path("/app").query(query).build())
        .unwrap();
    assert!(outcome.is_fully_valid());
    assert_eq!(outcome.restored_parameter("q"), Some(&["shoes".to_string()][..]));
}

/// Renders an order form and returns its token.
fn render_order_form(guard: &StateGuard, session: &Arc<dyn SessionStore>) -> String {
    let ctx = request(session, "/order/edit.do").build();
    let mut composer = guard.composer(&ctx);
    composer.start_page().unwrap();
    let action = FormUrlProcessor
        .process_action(&mut composer, "save.do", Method::Post)
        .unwrap();
    assert!(action.is_state_open());
    assert_eq!(composer.compose_form_field("id", "42", false, "hidden").unwrap(), "0");
    composer.compose_form_field("comment", "", true, "textarea").unwrap();
    composer.compose_form_field("secret", "", true, "password").unwrap();
    composer.compose_form_field("gift", "yes", false, "checkbox").unwrap();
    let token = composer.end_request().unwrap();
    composer.end_page().unwrap();
    token
}

fn submit_order(token: &str, session: &Arc<dyn SessionStore>) -> RequestContextBuilder {
    request(session, "/order/save.do")
        .method(Method::Post)
        .param(STATE, token)
}

#[test]
fn editable_failure_is_soft_and_other_parameters_still_validate() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let token = render_order_form(&guard, &session);

    let outcome = guard
        .validate(
            &submit_order(&token, &session)
                .param("id", "0")
                .param("comment", "<script>alert(1)</script>")
                .build(),
        )
        .unwrap();
    assert_eq!(outcome.legality(), Legality::ValidWithErrors);
    assert!(outcome.has_editable_errors());
    assert_eq!(
        only_error(&outcome),
        (ViolationKind::EditableValidationFailure, ErrorCode::InvalidEditableValue)
    );
    assert_eq!(outcome.restored_parameter("id"), Some(&["42".to_string()][..]));

    // the same submission with a tampered id is rejected outright
    let outcome = guard
        .validate(
            &submit_order(&token, &session)
                .param("id", "5")
                .param("comment", "<script>alert(1)</script>")
                .build(),
        )
        .unwrap();
    assert_eq!(outcome.legality(), Legality::Invalid);
    assert_eq!(outcome.errors().len(), 2);
    assert_eq!(outcome.first_error().unwrap().code(), ErrorCode::InvalidConfidentialParameter);
}

#[test]
fn rejected_password_value_is_not_recorded() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let token = render_order_form(&guard, &session);

    let outcome = guard
        .validate(
            &submit_order(&token, &session)
                .param("id", "0")
                .param("secret", "<b>hunter2</b>")
                .build(),
        )
        .unwrap();
    let error = &outcome.errors()[0];
    assert_eq!(error.parameter(), Some("secret"));
    assert_eq!(error.value(), None);
}

#[test]
fn missing_required_parameter_is_reported() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let token = render_order_form(&guard, &session);

    // unchecked checkbox and empty editable fields may be absent
    let ok = guard
        .validate(&submit_order(&token, &session).param("id", "0").build())
        .unwrap();
    assert!(ok.is_fully_valid());

    let missing = guard.validate(&submit_order(&token, &session).build()).unwrap();
    assert_eq!(
        only_error(&missing),
        (ViolationKind::ParameterTampering, ErrorCode::RequiredParameters)
    );
    assert_eq!(missing.errors()[0].parameter(), Some("id"));
}

#[test]
fn integrity_off_reports_but_lets_requests_through() {
    let guard = StateGuard::new(Config::builder().integrity_validation(false).build().unwrap());
    let session = new_session();

    let outcome = guard
        .validate(&request(&session, "/a.do").param("x", "1").build())
        .unwrap();
    assert_eq!(outcome.legality(), Legality::ValidWithErrors);
    assert_eq!(outcome.errors()[0].code(), ErrorCode::RequiredStateParam);
    assert_eq!(outcome.restored_parameter("x"), Some(&["1".to_string()][..]));
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

#[test]
fn start_pages_excluded_extensions_and_unprotected_urls_pass() {
    let guard = StateGuard::new(
        Config::builder()
            .start_page("/login\\.do", Some(Method::Post))
            .excluded_extension(".png")
            .protected_url("/secure/.*")
            .build()
            .unwrap(),
    );
    let session = new_session();

    let login = request(&session, "/secure/login.do").method(Method::Post).build();
    assert!(!guard.validate(&login).unwrap().is_valid());

    let login = request(&session, "/login.do")
        .method(Method::Post)
        .param("user", "alice")
        .build();
    let outcome = guard.validate(&login).unwrap();
    assert!(outcome.is_fully_valid());
    assert_eq!(outcome.restored_parameter("user"), Some(&["alice".to_string()][..]));

    assert!(follow(&guard, &session, "/secure/logo.png").is_fully_valid());
    assert!(follow(&guard, &session, "/public.do?x=1").is_fully_valid());
    assert!(!follow(&guard, &session, "/secure/a.do?x=1").is_valid());
}

#[test]
fn error_page_is_an_implicit_start_page() {
    let guard = StateGuard::new(Config::builder().error_page("error.do").build().unwrap());
    let session = new_session();
    assert!(guard.is_start_page("/error.do", Method::Post));
    assert!(follow(&guard, &session, "/error.do?reason=1").is_fully_valid());
}

// ---------------------------------------------------------------------------
// Page cache
// ---------------------------------------------------------------------------

#[test]
fn oldest_page_is_evicted() {
    let guard = StateGuard::new(Config::builder().max_pages_per_session(2).build().unwrap());
    let session = new_session();
    let links: Vec<String> = ["/a.do?n=1", "/b.do?n=2", "/c.do?n=3"]
        .iter()
        .map(|link| render_from(&guard, &session, "/index.do", link))
        .collect();

    assert_eq!(guard.pages().page_count(session.as_ref()).unwrap(), 2);
    assert_eq!(
        only_error(&follow(&guard, &session, &links[0])),
        (ViolationKind::InvalidPageOrState, ErrorCode::InvalidPageId)
    );
    assert!(follow(&guard, &session, &links[1]).is_fully_valid());
    assert!(follow(&guard, &session, &links[2]).is_fully_valid());
}

#[test]
fn refresh_reuses_the_page() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/list.do?page=1");

    let (path, query) = link.split_once('?').unwrap();
    let list_request = request(&session, path).query(query).build();
    assert!(guard.validate(&list_request).unwrap().is_fully_valid());

    let first = render_links(&guard, &list_request, &["/detail.do?id=7"]).remove(0);
    assert_eq!(guard.pages().page_count(session.as_ref()).unwrap(), 2);

    // the user hits reload
    let second = render_links(&guard, &list_request, &["/detail.do?id=7"]).remove(0);
    assert_eq!(guard.pages().page_count(session.as_ref()).unwrap(), 2);

    let first_token: StateToken = token_of(&first).parse().unwrap();
    let second_token: StateToken = token_of(&second).parse().unwrap();
    assert_eq!(first_token.page_id(), second_token.page_id());
    assert_ne!(first_token.state_id(), second_token.state_id());

    // the reload replaced the earlier render of the page
    assert!(!follow(&guard, &session, &first).is_valid());
    assert!(follow(&guard, &session, &second).is_fully_valid());

    for _ in 0..20 {
        render_links(&guard, &list_request, &["/detail.do?id=7", "/detail.do?id=8"]);
    }
    let page_id = second_token.page_id().unwrap();
    let page = guard.pages().get_page(session.as_ref(), page_id).unwrap().unwrap();
    assert_eq!(page.states_count(), 2);
}

#[test]
fn ajax_request_continues_its_page() {
    let guard = StateGuard::new(
        Config::builder()
            .reuse_existing_page_in_ajax_request(true)
            .build()
            .unwrap(),
    );
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/rows.do?from=0");
    let page_id = token_of(&link).parse::<StateToken>().unwrap().page_id();

    let (path, query) = link.split_once('?').unwrap();
    let ajax = request(&session, path).query(query).ajax(true).build();
    let more = render_links(&guard, &ajax, &["/rows.do?from=20"]).remove(0);

    assert_eq!(token_of(&more).parse::<StateToken>().unwrap().page_id(), page_id);
    assert_eq!(guard.pages().page_count(session.as_ref()).unwrap(), 1);
    assert!(follow(&guard, &session, &link).is_fully_valid());
    assert!(follow(&guard, &session, &more).is_fully_valid());
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[test]
fn app_scope_shares_tokens_across_sessions() {
    let guard = StateGuard::new(
        Config::builder()
            .long_living_page("/menu\\.do", StateScopeType::App)
            .build()
            .unwrap(),
    );
    let alice = new_session();
    let bob = new_session();

    let from_alice = render_from(&guard, &alice, "/menu.do", "/orders.do?view=all");
    let from_bob = render_from(&guard, &bob, "/menu.do", "/orders.do?view=all");
    assert_eq!(token_of(&from_alice), token_of(&from_bob));
    assert!(token_of(&from_alice).starts_with("A-"));

    let carol = new_session();
    assert!(follow(&guard, &carol, &from_alice).is_fully_valid());
}

#[test]
fn page_scope_tokens_differ_between_pages() {
    let guard = StateGuard::new(Config::default());
    let session = new_session();
    let first = render_from(&guard, &session, "/index.do", "/orders.do?view=all");
    let second = render_from(&guard, &session, "/index.do", "/orders.do?view=all");
    assert_ne!(token_of(&first), token_of(&second));
}

#[test]
fn user_session_scope_is_private_to_the_session() {
    let guard = StateGuard::new(Config::default());
    let render = |session: &Arc<dyn SessionStore>| {
        let ctx = request(session, "/index.do").build();
        let mut composer = guard.composer(&ctx);
        composer.start_page().unwrap();
        composer.start_scope(StateScopeType::UserSession).unwrap();
        let link = LinkUrlProcessor.process_url(&mut composer, "/profile.do?tab=1").unwrap();
        composer.end_scope().unwrap();
        composer.end_page().unwrap();
        link
    };
    let alice = new_session();
    let first = render(&alice);
    let again = render(&alice);
    assert_eq!(token_of(&first), token_of(&again));
    assert!(token_of(&first).starts_with("U-"));
    assert!(follow(&guard, &alice, &first).is_fully_valid());

    let bob = new_session();
    assert_eq!(
        only_error(&follow(&guard, &bob, &first)),
        (ViolationKind::InvalidPageOrState, ErrorCode::InvalidPageId)
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_renders_in_one_session() {
    let guard = Arc::new(StateGuard::new(
        Config::builder().max_pages_per_session(16).build().unwrap(),
    ));
    let session = new_session();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let guard = Arc::clone(&guard);
            let session = Arc::clone(&session);
            thread::spawn(move || render_from(&guard, &session, "/index.do", &format!("/item.do?n={i}")))
        })
        .collect();
    let links: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut page_ids: Vec<_> = links
        .iter()
        .map(|l| token_of(l).parse::<StateToken>().unwrap().page_id())
        .collect();
    page_ids.sort_by_key(|id| id.map(|id| id.to_string()));
    page_ids.dedup();
    assert_eq!(page_ids.len(), 8);

    for link in &links {
        assert!(follow(&guard, &session, link).is_fully_valid());
    }
}

#[test]
fn parallel_ajax_requests_extend_one_page() {
    let guard = Arc::new(StateGuard::new(
        Config::builder()
            .reuse_existing_page_in_ajax_request(true)
            .build()
            .unwrap(),
    ));
    let session = new_session();
    let link = render_from(&guard, &session, "/index.do", "/rows.do?from=0");
    let (path, query) = link.split_once('?').unwrap();
    let (path, query) = (path.to_string(), query.to_string());

    let handles: Vec<_> = (1..=8)
        .map(|i| {
            let guard = Arc::clone(&guard);
            let session = Arc::clone(&session);
            let (path, query) = (path.clone(), query.clone());
            thread::spawn(move || {
                let ajax = request(&session, &path).query(&query).ajax(true).build();
                render_links(&guard, &ajax, &[format!("/rows.do?from={}", i * 20).as_str()]).remove(0)
            })
        })
        .collect();
    let links: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let page_id = token_of(&link).parse::<StateToken>().unwrap().page_id();
    for more in &links {
        assert_eq!(token_of(more).parse::<StateToken>().unwrap().page_id(), page_id);
        assert!(follow(&guard, &session, more).is_fully_valid());
    }
    assert!(follow(&guard, &session, &link).is_fully_valid());
}
