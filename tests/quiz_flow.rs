//! Quiz generation and taking, end to end over a stub completion service.

use async_trait::async_trait;
use smartstudy::cache::ResponseCache;
use smartstudy::provider::{CompletionRequest, CompletionService, ProviderFailure};
use smartstudy::quiz::{Answer, QuestionKind, QuizGenerator, QuizPlan, QuizSession, QuizStatus};
use smartstudy::{PipelineOrchestrator, RetryPolicy, RetryingInvoker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers by question kind; multiple-choice replies repeat once before changing.
#[derive(Default)]
struct QuizService {
    mcq_calls: AtomicUsize,
    tf_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionService for QuizService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderFailure> {
        let prompt = &request.messages.last().unwrap().content;
        self.prompts.lock().unwrap().push(prompt.clone());
        if prompt.contains("multiple-choice") {
            let n = self.mcq_calls.fetch_add(1, Ordering::SeqCst);
            // Calls 0 and 1 produce the same question.
            let id = if n == 0 { 0 } else { n - 1 };
            Ok(format!(
                "Question: What is {id}+1?\nA: {a}\nB: {b}\nC: 0\nD: 99\nCorrect Answer: B\nExplanation: Counting.",
                a = id + 2,
                b = id + 1
            ))
        } else if prompt.contains("true/false") {
            let n = self.tf_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Question: Statement number {n} is true.\nCorrect Answer: True"))
        } else {
            Err(ProviderFailure::network("unexpected prompt"))
        }
    }

    fn name(&self) -> &'static str {
        "quiz"
    }
}

fn generator(service: Arc<QuizService>) -> QuizGenerator {
    let invoker = RetryingInvoker::new(service, RetryPolicy::no_delay());
    let pipeline = PipelineOrchestrator::new(Arc::new(ResponseCache::disabled()), invoker);
    QuizGenerator::new(pipeline, "llama-3.3-70b-versatile").with_max_attempts(1)
}

#[tokio::test]
async fn generates_distribution_and_skips_duplicates() {
    let service = Arc::new(QuizService::default());
    let plan = QuizPlan::new("Mathematics", "Addition")
        .with_count(5)
        .with_kinds(vec![QuestionKind::MultipleChoice, QuestionKind::TrueFalse]);

    let quiz = generator(service.clone()).generate(&plan).await.unwrap();

    let kinds: Vec<QuestionKind> = quiz.questions.iter().map(|q| q.kind).collect();
    assert_eq!(
        kinds,
        vec![
            QuestionKind::MultipleChoice,
            QuestionKind::MultipleChoice,
            QuestionKind::MultipleChoice,
            QuestionKind::TrueFalse,
            QuestionKind::TrueFalse,
        ]
    );
    // One duplicate was rejected along the way.
    assert_eq!(service.mcq_calls.load(Ordering::SeqCst), 4);
    let texts: Vec<&str> = quiz.questions[..3].iter().map(|q| q.text()).collect();
    assert_eq!(texts, vec!["What is 0+1?", "What is 1+1?", "What is 2+1?"]);
    assert!(quiz.warnings.is_empty());
    assert!(quiz.failures.is_empty());
    assert_eq!(quiz.total_marks(), 5);
}

#[tokio::test]
async fn prompts_list_earlier_questions() {
    let service = Arc::new(QuizService::default());
    let plan = QuizPlan::new("Mathematics", "Addition")
        .with_count(2)
        .with_kinds(vec![QuestionKind::TrueFalse]);
    generator(service.clone()).generate(&plan).await.unwrap();

    let prompts = service.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("list:\nNone"));
    assert!(prompts[1].contains("Statement number 0 is true."));
}

#[tokio::test]
async fn failed_kind_keeps_fallback_questions() {
    let service = Arc::new(QuizService::default());
    let plan = QuizPlan::new("Mathematics", "Addition")
        .with_count(2)
        .with_kinds(vec![QuestionKind::FillBlank, QuestionKind::TrueFalse]);

    let quiz = generator(service).generate(&plan).await.unwrap();
    assert_eq!(quiz.questions.len(), 2);
    assert!(quiz.questions[0].record.is_fallback);
    assert_eq!(quiz.failures.len(), 1);
}

#[tokio::test]
async fn taking_the_generated_quiz() {
    let service = Arc::new(QuizService::default());
    let plan = QuizPlan::new("Mathematics", "Addition")
        .with_count(3)
        .with_kinds(vec![QuestionKind::MultipleChoice, QuestionKind::TrueFalse]);
    let quiz = generator(service).generate(&plan).await.unwrap();

    let mut session = QuizSession::from_generated(quiz, None);
    session.answer(0, Answer::Choice("B".into())).unwrap();
    session.answer(1, Answer::Choice("A".into())).unwrap();
    session.answer(2, Answer::TrueFalse(true)).unwrap();

    let report = session.submit();
    assert_eq!(session.status(), QuizStatus::Submitted { auto: false });
    assert_eq!(report.total_marks, 3);
    assert!((report.total_awarded - 2.0).abs() < f32::EPSILON);
    assert_eq!(report.results[1].correct, Some(false));
    assert!(session.answer(0, Answer::Choice("A".into())).is_err());
}
