use anyhow::Result;
use lesson_churn::core::catalog::PlanCatalog;
use lesson_churn::core::filters::{
    AmountRangeFilter, DurationFilter, FilterChain, PredicateFilter, ShortPeriodFilter,
    StatusFilter, TestInstanceFilter,
};
use lesson_churn::domain::model::RawCustomerRecord;
use lesson_churn::domain::ports::FilterSubject;
use lesson_churn::{AnalysisEngine, AnalysisRequest, MemoryLoader};

fn raw(email: &str, start: &str, cancel: Option<&str>, amount: &str) -> RawCustomerRecord {
    RawCustomerRecord {
        email: Some(email.to_string()),
        start_date: Some(start.to_string()),
        canceled_date: cancel.map(str::to_string),
        amount: Some(amount.to_string()),
        ..Default::default()
    }
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        from: Some("2023-01".parse().unwrap()),
        to: Some("2023-12".parse().unwrap()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_amount_and_duration_conjunction() -> Result<()> {
    let records = vec![
        // 50 fits no catalog plan and sits below the amount floor
        raw("cheap@example.com", "2023-01-01", None, "50"),
        raw("quarter@example.com", "2023-01-01", None, "540"),
        raw("monthly@example.com", "2023-01-01", None, "150"),
    ];
    let chain = FilterChain::new()
        .add_filter(AmountRangeFilter::new(100.0, 1000.0))
        .add_filter(DurationFilter::new(3, 12));

    let engine = AnalysisEngine::new(
        MemoryLoader::new(records),
        PlanCatalog::default_catalog(),
        chain,
        request(),
    );
    let outcome = engine.run().await?;

    let stats = &outcome.filter_stats;
    assert_eq!(stats.evaluated, 3);
    assert_eq!(stats.kept, 1);
    assert_eq!(stats.per_filter[0].excluded, 1);
    assert_eq!(stats.per_filter[1].excluded, 1);
    assert!(outcome.churn.unmatched.is_empty());
    assert!(outcome
        .revenue
        .lifetime_values
        .contains_key("quarter@example.com"));
    assert_eq!(outcome.revenue.lifetime_values.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_record_filters_and_predicates() -> Result<()> {
    let mut trial = raw("trial@example.com", "2023-01-01", None, "150");
    trial.status = Some("Trialing".to_string());
    let mut tester = raw("qa-test@example.com", "2023-01-01", None, "150");
    tester.name = Some("QA".to_string());

    let records = vec![
        trial,
        tester,
        raw("contest@example.com", "2023-01-01", None, "150"),
        raw("brief@example.com", "2023-03-01", Some("2023-03-10"), "150"),
        raw("vip@example.com", "2023-02-01", None, "220"),
        raw("keep@example.com", "2023-02-01", Some("2023-06-01"), "150"),
    ];
    let chain = FilterChain::new()
        .add_filter(StatusFilter::default())
        .add_filter(TestInstanceFilter::new(
            "test",
            &["contest@example.com".to_string()],
            &[],
        )?)
        .add_filter(ShortPeriodFilter::default())
        .add_filter(PredicateFilter::new("Drop premium monthly", |subject: &FilterSubject<'_>| {
            subject.record.amount < 200.0
        }));

    let engine = AnalysisEngine::new(
        MemoryLoader::new(records),
        PlanCatalog::default_catalog(),
        chain,
        request(),
    );
    let outcome = engine.run().await?;

    let kept: Vec<&str> = outcome
        .revenue
        .lifetime_values
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(kept, vec!["contest@example.com", "keep@example.com"]);

    let excluded: Vec<usize> = outcome
        .filter_stats
        .per_filter
        .iter()
        .map(|f| f.excluded)
        .collect();
    assert_eq!(excluded, vec![1, 1, 1, 1]);
    assert_eq!(outcome.filter_stats.per_filter[3].description, "Drop premium monthly");
    Ok(())
}
