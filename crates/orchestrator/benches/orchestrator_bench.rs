use common::{PropertyId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, PaymentMethod};
use orchestrator::{
    InMemoryComplianceChecker, InMemoryNotificationService, InMemoryPaymentProcessor,
    InMemoryShareAllocator, InvestmentRequest, OrchestratorConfig, WorkflowEngine,
};
use workflow_store::InMemoryWorkflowStore;

fn build_engine() -> WorkflowEngine<
    InMemoryWorkflowStore,
    InMemoryComplianceChecker,
    InMemoryPaymentProcessor,
    InMemoryNotificationService,
    InMemoryShareAllocator,
> {
    WorkflowEngine::new(
        InMemoryWorkflowStore::new(),
        InMemoryComplianceChecker::new(),
        InMemoryPaymentProcessor::new(),
        InMemoryNotificationService::new(),
        InMemoryShareAllocator::new(),
        OrchestratorConfig::default(),
    )
}

fn bench_happy_path_saga(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("orchestrator/investment_saga_happy_path", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = build_engine();
                let id = engine
                    .submit_investment(InvestmentRequest {
                        user_id: UserId::new(),
                        property_id: PropertyId::new(),
                        amount: Money::from_naira(50_000),
                        payment_method: PaymentMethod::Card,
                    })
                    .await
                    .unwrap();
                engine.run_execution(id).await.unwrap();
            });
        });
    });
}

fn bench_submission_only(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = build_engine();

    c.bench_function("orchestrator/submit_investment", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine
                    .submit_investment(InvestmentRequest {
                        user_id: UserId::new(),
                        property_id: PropertyId::new(),
                        amount: Money::from_naira(10_000),
                        payment_method: PaymentMethod::Wallet,
                    })
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_happy_path_saga, bench_submission_only);
criterion_main!(benches);
