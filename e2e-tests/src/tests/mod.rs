

use anyhow::Result;
use crate::tests::test_runner::{TestRunner, TestRunnerConfig};

pub async fn run_tests(mysql_batch_binary: String, test_names: Option<Vec<String>>) -> Result<()> {
    let config = TestRunnerConfig { mysql_batch_binary };

    let runner = TestRunner::new(config);

    let suite = if let Some(names) = test_names {
        runner.run_filtered_tests(&names).await?
    } else {
        runner.run_all_tests().await?
    };

    let failed_count = suite.failed_count() + suite.timeout_count();
    if failed_count > 0 {
        std::process::exit(1);
    }

    Ok(())
}
