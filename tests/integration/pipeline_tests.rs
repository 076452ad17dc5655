use super::*;
use marketplace_harvester::orchestrator::SourceOutcome;
use marketplace_harvester::store::SearchCriteria;
use rstest::rstest;

fn completed(outcome: &SourceOutcome) -> &marketplace_harvester::adapter::SourceReport {
    match outcome {
        SourceOutcome::Completed(report) => report,
        SourceOutcome::Failed { source, error } => panic!("{} failed: {}", source, error),
    }
}

#[tokio::test]
async fn test_incomplete_items_are_never_stored() -> anyhow::Result<()> {
    let source = MarketplaceSource::Kaspi;
    let hrefs: Vec<String> = (1..=3).map(|n| format!("/p/{}", n)).collect();
    let browser = ScriptedBrowser::new(vec![
        (list_url(source), list_page(&hrefs)),
        (item_url(source, 1), item_page("Clear phone case", Some("2 990 ₸"))),
        (item_url(source, 2), item_page("Leather phone case", None)),
        (item_url(source, 3), item_page("Phone case with ring", Some("на заказ"))),
    ]);
    let store = create_test_store().await?;
    let orchestrator = create_orchestrator(vec![rules_for(source, 12)], store.clone(), browser);

    let report = orchestrator.run(QUERY).await;
    let kaspi = completed(&report.outcomes[0]);
    assert_eq!(kaspi.discovered, 3);
    assert_eq!(kaspi.inserted, 1);
    assert_eq!(kaspi.incomplete, 2);

    let stored = store.all().await?;
    assert_eq!(stored.len(), 1);
    let record = &stored[0];
    assert_eq!(record.title, "Clear phone case");
    assert_eq!(record.price, "2990.00 ₸");
    assert_eq!(record.image_src, "https://kaspi.test/img/16.jpg");
    assert_eq!(record.link, item_url(source, 1));
    assert_eq!(record.query, QUERY);
    assert!(stored.iter().all(|r| !r.title.is_empty() && !r.price.is_empty() && !r.image_src.is_empty()));
    Ok(())
}

#[tokio::test]
async fn test_repeated_ingestion_is_idempotent() -> anyhow::Result<()> {
    let source = MarketplaceSource::Alfa;
    let browser = ScriptedBrowser::new(catalog_pages(source, 4));
    let store = create_test_store().await?;
    let orchestrator = create_orchestrator(vec![rules_for(source, 12)], store.clone(), browser);

    let first = orchestrator.run(QUERY).await;
    assert_eq!(first.total_inserted(), 4);

    let second = orchestrator.run(QUERY).await;
    let alfa = completed(&second.outcomes[0]);
    assert_eq!(alfa.inserted, 0);
    assert_eq!(alfa.already_present, 4);
    assert!(second.requires_requery());

    assert_eq!(store.count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn test_same_link_is_stored_once_per_query() -> anyhow::Result<()> {
    let source = MarketplaceSource::Olx;
    let mut pages = catalog_pages(source, 2);
    let other_query = "phone";
    pages.push((
        format!("{}/search?q={}", host(source), other_query),
        list_page(&["/p/1".to_string()]),
    ));
    let store = create_test_store().await?;
    let orchestrator =
        create_orchestrator(vec![rules_for(source, 12)], store.clone(), ScriptedBrowser::new(pages));

    orchestrator.run(QUERY).await;
    orchestrator.run(other_query).await;

    let under_other = store
        .find(&SearchCriteria::for_query(other_query, None))
        .await?;
    assert_eq!(under_other.len(), 1);
    assert_eq!(store.count().await?, 3);
    Ok(())
}

#[rstest]
#[case(20, 5, 5)]
#[case(3, 12, 3)]
#[tokio::test]
async fn test_link_discovery_is_capped_and_deduplicated(
    #[case] available: usize,
    #[case] max_links: usize,
    #[case] expected: usize,
) -> anyhow::Result<()> {
    let source = MarketplaceSource::Wildberries;
    let mut hrefs = vec!["/wishlist/add/1".to_string()];
    for n in 1..=available {
        hrefs.push(format!("/p/{}", n));
        hrefs.push(format!("{}/p/{}", host(source), n));
    }
    let mut pages = catalog_pages(source, available);
    pages[0] = (list_url(source), list_page(&hrefs));

    let browser = ScriptedBrowser::new(pages);
    let store = create_test_store().await?;
    let orchestrator =
        create_orchestrator(vec![rules_for(source, max_links)], store.clone(), browser.clone());

    let report = orchestrator.run(QUERY).await;
    assert_eq!(completed(&report.outcomes[0]).discovered, expected);

    let detail_visits: Vec<String> = browser
        .visits()
        .into_iter()
        .filter(|url| url.contains("/p/"))
        .collect();
    let expected_visits: Vec<String> = (1..=expected).map(|n| item_url(source, n)).collect();
    assert_eq!(detail_visits, expected_visits);
    assert_eq!(store.count().await?, expected as i64);
    Ok(())
}

#[tokio::test]
async fn test_failing_sources_do_not_affect_siblings() -> anyhow::Result<()> {
    let mut pages = catalog_pages(MarketplaceSource::Kaspi, 2);
    // Wildberries has no list page; OLX cannot launch a browser.
    pages.extend(catalog_pages(MarketplaceSource::Alfa, 1));
    let browser = ScriptedBrowser::new(pages).refusing(&[MarketplaceSource::Olx]);
    let store = create_test_store().await?;

    let sources = [
        MarketplaceSource::Olx,
        MarketplaceSource::Kaspi,
        MarketplaceSource::Alfa,
        MarketplaceSource::Wildberries,
    ];
    let orchestrator = create_orchestrator(
        sources.iter().map(|s| rules_for(*s, 12)).collect(),
        store.clone(),
        browser.clone(),
    );

    let report = orchestrator.run(QUERY).await;

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(
        report.failed_sources(),
        vec![MarketplaceSource::Olx, MarketplaceSource::Wildberries]
    );
    assert_eq!(report.total_inserted(), 3);
    assert_eq!(store.count().await?, 3);

    // The Wildberries session opened and was still released.
    assert_eq!(browser.opened(MarketplaceSource::Wildberries), 1);
    assert_eq!(browser.closed(MarketplaceSource::Wildberries), 1);
    assert_eq!(browser.opened(MarketplaceSource::Olx), 0);
    Ok(())
}

#[tokio::test]
async fn test_detail_timeout_moves_on_to_next_link() -> anyhow::Result<()> {
    let source = MarketplaceSource::Ozon;
    let mut pages = catalog_pages(source, 3);
    pages[1] = (item_url(source, 1), Page::Timeout);
    let browser = ScriptedBrowser::new(pages);
    let store = create_test_store().await?;
    let orchestrator = create_orchestrator(vec![rules_for(source, 12)], store.clone(), browser.clone());

    let report = orchestrator.run(QUERY).await;
    let ozon = completed(&report.outcomes[0]);
    assert_eq!(ozon.failed, 1);
    assert_eq!(ozon.inserted, 2);

    assert_eq!(
        browser.visits(),
        vec![
            list_url(source),
            item_url(source, 1),
            item_url(source, 2),
            item_url(source, 3)
        ]
    );
    assert_eq!(browser.opened(source), 1);
    assert_eq!(browser.closed(source), 1);
    Ok(())
}

#[test]
fn test_empty_list_page_yields_nothing() {
    tokio_test::block_on(async {
        let source = MarketplaceSource::Lamoda;
        let browser = ScriptedBrowser::new(vec![(list_url(source), list_page(&[]))]);
        let store = create_test_store().await.unwrap();
        let orchestrator = create_orchestrator(vec![rules_for(source, 12)], store, browser.clone());

        let report = orchestrator.run(QUERY).await;
        assert_eq!(completed(&report.outcomes[0]).discovered, 0);
        assert!(!report.requires_requery());
        assert_eq!(browser.closed(source), 1);
    });
}
