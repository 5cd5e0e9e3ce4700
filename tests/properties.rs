//! Property tests for the pure text stages and the classifier.

use std::sync::LazyLock;

use camino::Utf8PathBuf;
use ctxpack::core::classify::{Classifier, classify};
use ctxpack::core::minify::minify;
use ctxpack::core::redact::{Redactor, UserIdentity};
use ctxpack::core::tokens::TokenEstimator;
use ctxpack::{Category, PipelineConfig};
use proptest::prelude::*;

const MODELS: [&str; 5] = ["gpt-4o", "claude-3-opus", "gemini-1.5-pro", "llama-3-70b", "unknown-model"];

// Loading a BPE table is slow; build each estimator once
static ESTIMATORS: LazyLock<Vec<TokenEstimator>> =
    LazyLock::new(|| MODELS.iter().map(|m| TokenEstimator::new(m)).collect());

fn fragment() -> impl Strategy<Value = String>
{
    prop_oneof![
        "[a-z]{1,8}",
        "[a-z]{1,6}@[a-z]{2,6}\\.(com|org)",
        "(10|172|192)\\.[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
        "sk_live_[A-Za-z0-9]{16,24}",
        "(password|api_key) = \"[A-Za-z0-9]{8,16}\"",
        "/home/alice(/[a-z]{1,6}){0,3}",
        "/srv(/(alice|ALICE|[a-z]{1,6})){1,4}",
        "[A-Z]:(\\\\(alice|[a-z]{1,6})){1,3}",
    ]
}

fn text_of_fragments() -> impl Strategy<Value = String>
{
    prop::collection::vec((fragment(), prop_oneof![Just(" "), Just("\n")]), 0..12).prop_map(
        |parts| {
            parts
                .into_iter()
                .map(|(f, sep)| format!("{f}{sep}"))
                .collect()
        },
    )
}

/// Fixed identity so the username and home rules fire
fn alice() -> UserIdentity
{
    UserIdentity { home: Some("/home/alice".into()), username: Some("alice".into()) }
}

/// Python statement paired with an optional trailing comment
fn python_line() -> impl Strategy<Value = (String, Option<String>)>
{
    let code = prop_oneof![
        Just("x = 1".to_string()),
        Just("def f(a, b):".to_string()),
        Just("    return a + b".to_string()),
        Just("    s = \"a # not a comment\"".to_string()),
        Just("class K:".to_string()),
        Just("".to_string()),
    ];
    (code, prop::option::of("[a-z ]{0,12}"))
}

proptest! {
    #[test]
    fn redaction_is_idempotent(text in text_of_fragments())
    {
        let r = Redactor::new(&alice(), true).unwrap();
        let once = r.redact(&text);
        let twice = r.redact(&once.text);

        prop_assert_eq!(twice.count, 0);
        prop_assert_eq!(&twice.text, &once.text);
        prop_assert!(!once.text.contains("sk_live_"));
        prop_assert!(!once.text.contains("/home/alice"));
        prop_assert!(!once.text.to_lowercase().contains("/alice/"));
    }

    #[test]
    fn minifier_keeps_every_code_token(lines in prop::collection::vec(python_line(), 0..20))
    {
        let mut source = String::new();
        let mut expected: Vec<String> = Vec::new();
        for (code, comment) in &lines
        {
            source.push_str(code);
            if let Some(c) = comment
            {
                if !code.is_empty()
                {
                    source.push_str("  ");
                }
                source.push('#');
                source.push_str(c);
            }
            source.push('\n');
            expected.extend(code.split_whitespace().map(str::to_string));
        }

        let out = minify(&source, ".py");
        let actual: Vec<String> = out.split_whitespace().map(str::to_string).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn classification_is_pure(
        dirs in prop::collection::vec("[a-z_]{1,6}", 0..4),
        name in "(test_)?[a-z]{1,6}\\.(py|rs|md|bin)",
    )
    {
        let mut path = Utf8PathBuf::new();
        for d in &dirs
        {
            path.push(d);
        }
        path.push(&name);

        let cfg = PipelineConfig::for_root("/project");
        let first = Classifier::new(&cfg).unwrap().classify(&path);
        let second = Classifier::new(&cfg).unwrap().classify(&path);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first, classify(&path, &cfg).unwrap());

        let hidden = Utf8PathBuf::from("node_modules").join(&path);
        prop_assert_eq!(Classifier::new(&cfg).unwrap().classify(&hidden), Category::Excluded);
    }

    #[test]
    fn estimates_never_shrink_on_append(
        a in "[ -~\n]{0,60}",
        b in "[ -~\n]{0,20}",
        model in 0..MODELS.len(),
    )
    {
        let est = &ESTIMATORS[model];
        let joined = format!("{a}{b}");
        prop_assert!(est.estimate(&joined) >= est.estimate(&a));
    }
}
