//! Interface de terminal do lessonforge — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! a execução de um job de aula no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::collaborators::BookStructure;
use crate::state_machine::{JobReport, JobSnapshot, JobStatus};

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe um spinner animado enquanto o job avança pelos estágios e
/// mensagens coloridas para sucesso (verde) e falha (vermelho).
pub struct JobProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner para o tópico e retorna a instância de progresso.
    pub fn start(topic_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{}: {topic_id}", JobStatus::Queued));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para refletir o estágio atual.
    pub fn update(&self, snapshot: &JobSnapshot) {
        self.pb.set_message(stage_line(snapshot));
    }

    /// Finaliza o spinner e exibe o resultado final do job.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn complete(&self, snapshot: &JobSnapshot) {
        self.pb.finish_and_clear();
        match snapshot.status {
            JobStatus::Completed => println!(
                "  {} Lesson ready: {}",
                self.green.apply_to("✓"),
                snapshot.result.as_deref().unwrap_or_default()
            ),
            _ => println!(
                "  {} Job failed: {}",
                self.red.apply_to("✗"),
                snapshot.message.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    /// Imprime o relatório do job formatado em JSON com estilo colorido.
    pub fn print_report(&self, report: &JobReport) {
        let status_style = match report.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Job Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}

fn stage_line(snapshot: &JobSnapshot) -> String {
    match &snapshot.message {
        Some(message) => format!("{}: {message}", snapshot.status),
        None => format!("Current step: {}", snapshot.status),
    }
}

/// Imprime a árvore capítulo → tópico, marcando tópicos já na biblioteca.
pub fn print_book(book: &BookStructure) {
    let bold = Style::new().bold();
    let green = Style::new().green();
    println!("{} ({})", bold.apply_to(&book.title), book.book_id);
    for chapter in &book.chapters {
        println!("  {} {}", chapter.chapter_id, bold.apply_to(&chapter.title));
        for topic in &chapter.topics {
            let mark = if topic.is_ready {
                green.apply_to("●").to_string()
            } else {
                "○".to_string()
            };
            println!("    {mark} {} {}", topic.topic_id, topic.title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: JobStatus, message: Option<&str>) -> JobSnapshot {
        JobSnapshot {
            job_id: "j1".into(),
            status,
            message: message.map(str::to_string),
            result: None,
        }
    }

    #[test]
    fn stage_line_falls_back_to_current_step() {
        assert_eq!(
            stage_line(&snapshot(JobStatus::Scripting, None)),
            "Current step: SCRIPTING"
        );
        assert_eq!(
            stage_line(&snapshot(JobStatus::Failed, Some("renderer failed: quota"))),
            "FAILED: renderer failed: quota"
        );
    }
}
