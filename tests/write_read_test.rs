mod helpers;

use chrono::Utc;
use helpers::{article, hours_before, page_metadata, stack};
use tabrecall::config::ContentConfig;
use tabrecall::content::chunking::smart_chunk;
use tabrecall::content::ContentStore;
use tabrecall::memory::store::PageVisit;
use tabrecall::memory::MemoryStore;

fn visit(user: &str, url: &str, title: &str) -> PageVisit {
    PageVisit {
        user_id: user.into(),
        url: url.into(),
        title: title.into(),
        synopsis: format!("Visited: {title}"),
        tags: vec!["browser".into(), "tab".into()],
        preview: String::new(),
    }
}

#[test]
fn browser_memory_round_trips_page_fields() {
    let s = stack();
    let id = s
        .memories
        .add_browser_memory(&visit("u", "https://tokio.rs/tokio/tutorial", "Tokio Tutorial"))
        .unwrap();

    let record = s.memories.get(&id).unwrap().unwrap();
    assert_eq!(record.user_id, "u");
    let info = record.page_info();
    assert_eq!(info.title, "Tokio Tutorial");
    assert_eq!(info.url.as_deref(), Some("https://tokio.rs/tokio/tutorial"));
    assert_eq!(info.domain.as_deref(), Some("tokio.rs"));
}

#[test]
fn search_is_scoped_to_user_and_ranked() {
    let s = stack();
    let tokio = s
        .memories
        .add_browser_memory(&visit("u", "https://tokio.rs/", "Tokio runtime"))
        .unwrap();
    s.memories
        .add_browser_memory(&visit("u", "https://bread.example/", "Sourdough starter"))
        .unwrap();
    s.memories
        .add_browser_memory(&visit("someone-else", "https://tokio.rs/blog", "Tokio blog"))
        .unwrap();

    let hits = s.memories.search("tokio tasks", "u", 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, tokio);
    assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
    assert!(hits.iter().all(|h| h.user_id == "u"));

    assert_eq!(s.memories.get_all("u").unwrap().len(), 2);
    assert!(s.memories.get_all("nobody").unwrap().is_empty());
}

#[test]
fn recent_lists_newest_first() {
    let s = stack();
    let now = Utc::now();
    for (hours, title) in [(5, "five"), (1, "one"), (30, "thirty")] {
        s.memories
            .add_memory_at(
                "u",
                &format!("note {title}"),
                Some(page_metadata("https://a.example/", title, "a.example")),
                hours_before(now, hours),
            )
            .unwrap();
    }

    let titles: Vec<String> = s
        .memories
        .recent("u", 2)
        .unwrap()
        .iter()
        .map(|r| r.page_info().title)
        .collect();
    assert_eq!(titles, vec!["one", "five"]);
}

#[test]
fn chunks_are_stored_and_filtered_by_source() {
    let s = stack();
    let config = ContentConfig::default();

    let tokio_id = s
        .memories
        .add_browser_memory(&visit("u", "https://tokio.rs/tokio/tutorial", "Tokio"))
        .unwrap();
    let bread_id = s
        .memories
        .add_browser_memory(&visit("u", "https://bread.example/starter", "Bread"))
        .unwrap();

    let tokio_chunks = smart_chunk(&article("tokio"), "Tokio", "https://tokio.rs/tokio/tutorial", &config);
    let bread_chunks = smart_chunk(&article("sourdough"), "Bread", "https://bread.example/starter", &config);
    assert!(!tokio_chunks.is_empty());
    assert!(!bread_chunks.is_empty());

    let stored = s.content.add_chunks(&tokio_id, &tokio_chunks).unwrap()
        + s.content.add_chunks(&bread_id, &bread_chunks).unwrap();
    assert_eq!(s.content.count().unwrap(), stored);
    assert_eq!(
        s.content.unique_sources().unwrap(),
        vec!["bread.example".to_string(), "tokio.rs".to_string()]
    );

    let filtered = s.content.search_chunks("tokio", Some("bread.example"), 10).unwrap();
    assert!(!filtered.is_empty());
    assert!(filtered.iter().all(|c| c.chunk.source_id == "bread.example"));

    let open = s.content.search_chunks("tokio scheduling", None, 1).unwrap();
    assert_eq!(open[0].memory_id, tokio_id);
}

#[test]
fn delete_and_clear_remove_chunks_too() {
    let s = stack();
    let config = ContentConfig::default();
    let url = "https://tokio.rs/tokio/tutorial";

    let first = s.memories.add_browser_memory(&visit("u", url, "Tokio")).unwrap();
    let second = s.memories.add_browser_memory(&visit("u", url, "Tokio again")).unwrap();
    let chunks = smart_chunk(&article("tokio"), "Tokio", url, &config);
    let per_memory = s.content.add_chunks(&first, &chunks).unwrap();
    s.content.add_chunks(&second, &chunks).unwrap();

    let outcome = s.memories.delete(&first, "u").unwrap();
    assert!(outcome.deleted);
    assert_eq!(outcome.chunks_removed, per_memory);
    assert!(s.memories.get(&first).unwrap().is_none());

    // Someone else's id is left alone.
    assert!(!s.memories.delete(&second, "intruder").unwrap().deleted);

    let cleared = s.memories.clear("u").unwrap();
    assert_eq!(cleared.memories_removed, 1);
    assert_eq!(cleared.chunks_removed, per_memory);
    assert_eq!(s.content.count().unwrap(), 0);
    assert_eq!(s.memories.count("u").unwrap(), 0);
}
