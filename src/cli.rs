//! Interface de linha de comando do lessonforge baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, generate, book)
//! e flags globais (--config, --verbose, --log-format).

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// lessonforge — Orquestrador de aulas em vídeo personalizadas.
#[derive(Debug, Parser)]
#[command(name = "lessonforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML (padrão: `lessonforge.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Formato dos logs emitidos em stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Formato de saída dos logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Texto legível para humanos.
    Text,
    /// Uma linha JSON por evento.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sobe a API HTTP de polling.
    Serve {
        /// Endereço de escuta (sobrescreve `[server] listen`).
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Gera uma aula personalizada no próprio processo e imprime o relatório.
    Generate {
        /// Identificador do tópico, ex.: `PHY12_01_02`.
        topic_id: String,

        /// Nome do professor usado na introdução.
        #[arg(long)]
        teacher: Option<String>,

        /// Tom da introdução.
        #[arg(long)]
        tone: Option<String>,

        /// Idioma da introdução.
        #[arg(long)]
        language: Option<String>,

        /// Avatar usado na renderização da introdução.
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Mostra a árvore de capítulos e tópicos de um livro.
    Book {
        /// Referência do documento de origem.
        #[arg(long, default_value = "default")]
        source: String,
    },
}
