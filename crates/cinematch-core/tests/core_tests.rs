use std::fs;
use tempfile::TempDir;

use cinematch_core::config::Config;
use cinematch_core::corpus::Corpus;
use cinematch_core::error::Error;

const MOVIES: &str = r#"[
  {"id": 1, "title": "Alien", "year": 1979, "imdb_rating": 8.5, "genres": "Horror, Sci-Fi",
   "directors": "Ridley Scott", "stars": "Sigourney Weaver", "plot": "A crew meets a creature.",
   "generated_summary": "space horror aboard a cargo ship"},
  {"id": 2, "title": "Airplane!", "year": 1980, "imdb_rating": 7.7, "genres": ["Comedy"],
   "directors": ["Jim Abrahams"], "stars": [], "plot": "A pilot panics."}
]"#;

#[test]
fn load_json_array_corpus() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("movies.json");
    fs::write(&path, MOVIES).unwrap();

    let corpus = Corpus::load(&path).expect("load");
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.get(0).unwrap().genres, vec!["Horror", "Sci-Fi"]);
    assert!(corpus.get(0).unwrap().has_summary());
    assert!(!corpus.get(1).unwrap().has_summary());
    assert_eq!(corpus.genre_vocabulary(), vec!["Comedy", "Horror", "Sci-Fi"]);
}

#[test]
fn save_and_reload_jsonl_keeps_row_order() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("movies.json");
    fs::write(&src, MOVIES).unwrap();
    let corpus = Corpus::load(&src).unwrap();

    let dst = tmp.path().join("out/movies.jsonl");
    corpus.save(&dst).expect("save");
    let reloaded = Corpus::load(&dst).expect("reload");
    let titles: Vec<_> = reloaded.records().iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Alien", "Airplane!"]);
}

#[test]
fn missing_or_broken_corpus_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let missing = Corpus::load(&tmp.path().join("nope.json"));
    assert!(matches!(missing, Err(Error::Configuration(_))));

    let broken = tmp.path().join("broken.jsonl");
    fs::write(&broken, "{\"title\": \"ok\"}\nnot json\n").unwrap();
    match Corpus::load(&broken) {
        Err(Error::Configuration(msg)) => assert!(msg.contains(":2:"), "reports line: {msg}"),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn alignment_check_compares_index_size_to_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("movies.json");
    fs::write(&path, MOVIES).unwrap();
    let corpus = Corpus::load(&path).unwrap();

    assert!(corpus.check_alignment("vector index", 2).is_ok());
    assert!(matches!(corpus.check_alignment("vector index", 3), Err(Error::Configuration(_))));
}

#[test]
fn config_reads_toml_and_resolves_paths_against_its_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[data]\ncorpus_path = \"corpus/movies.jsonl\"\n\n[retrieval]\ntop_k = 7\n\n[filters]\nyears = true\n",
    )
    .unwrap();

    let config = Config::load_from(tmp.path()).expect("config");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 7);
    assert!(settings.filters.years);
    assert!(!settings.filters.stars, "optional stages default to off");
    assert_eq!(settings.llm.retry_attempts, 3);
    assert_eq!(config.path(&settings.data.corpus_path), tmp.path().join("corpus/movies.jsonl"));
    assert_eq!(config.get::<usize>("retrieval.top_k").unwrap(), 7);
}

#[test]
fn config_rejects_zero_top_k() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[retrieval]\ntop_k = 0\n").unwrap();
    assert!(Config::load_from(tmp.path()).is_err());
}
