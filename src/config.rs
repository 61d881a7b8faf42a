//! Configuração do lessonforge carregada a partir de `lessonforge.toml`.
//!
//! A struct [`LessonConfig`] reúne todos os parâmetros configuráveis e é
//! passada explicitamente a cada componente na construção. Valores não
//! presentes no arquivo usam defaults sensíveis. Os segredos
//! (`ANTHROPIC_API_KEY`, `HEYGEN_API_KEY`, `GCS_ACCESS_TOKEN`) vêm de variáveis
//! de ambiente, que têm precedência sobre o arquivo.
//!
//! A seleção entre colaborador real (`live`) e substituto (`stand_in`) é
//! sempre explícita: nunca é inferida da ausência de credenciais.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::collaborators::ModelTier;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "lessonforge.toml";

/// Configuração de nível superior carregada de `lessonforge.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct LessonConfig {
    /// Identificador do projeto na nuvem; também deriva o bucket padrão.
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Região dos serviços remotos.
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub collaborators: CollaboratorConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub stitcher: StitcherConfig,

    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Endereço de escuta da API HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// Nível de modelo usado por cada estágio do pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_research_tier")]
    pub research: ModelTier,
    #[serde(default = "default_script_tier")]
    pub script: ModelTier,
    /// A introdução personalizada é curta; usa o nível rápido.
    #[serde(default = "default_intro_tier")]
    pub intro: ModelTier,
}

/// Backend de geração de texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextBackend {
    Live,
    StandIn,
}

/// Backend de renderização de vídeo com avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackend {
    Live,
    StandIn,
}

/// Backend de armazenamento dos vídeos finais e URLs de upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Gcs,
    Local,
}

/// Backend da biblioteca de aulas principais.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

/// Seleção e parâmetros dos colaboradores externos.
#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorConfig {
    #[serde(default = "default_text_backend")]
    pub text: TextBackend,
    #[serde(default = "default_render_backend")]
    pub render: RenderBackend,
    #[serde(default = "default_storage_backend")]
    pub storage: StorageBackend,

    /// Chave da API Anthropic (sobrescrita por `ANTHROPIC_API_KEY`).
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Chave da API HeyGen (sobrescrita por `HEYGEN_API_KEY`).
    #[serde(default)]
    pub heygen_api_key: String,
    #[serde(default = "default_heygen_base_url")]
    pub heygen_base_url: String,
    #[serde(default = "default_render_poll_interval_ms")]
    pub render_poll_interval_ms: u64,
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,

    /// Token OAuth do GCS (sobrescrito por `GCS_ACCESS_TOKEN`).
    #[serde(default)]
    pub gcs_access_token: String,
    #[serde(default = "default_gcs_base_url")]
    pub gcs_base_url: String,
    /// Bucket de destino; vazio significa `<project_id>-assets`.
    #[serde(default)]
    pub bucket: String,

    /// Raiz de publicação do armazenamento local.
    #[serde(default = "default_publish_dir")]
    pub publish_dir: PathBuf,

    /// Timeout por chamada HTTP a um colaborador.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Biblioteca de aulas principais.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

/// Montagem do vídeo final com ffmpeg.
#[derive(Debug, Clone, Deserialize)]
pub struct StitcherConfig {
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_stitch_timeout_secs")]
    pub timeout_secs: u64,
}

/// Retenção da tabela de jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Máximo de jobs mantidos; ao exceder, o job terminal mais antigo é descartado.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

fn default_project_id() -> String {
    "demo".to_string()
}

fn default_region() -> String {
    "us-central1".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_research_tier() -> ModelTier {
    ModelTier::Sonnet
}

fn default_script_tier() -> ModelTier {
    ModelTier::Sonnet
}

fn default_intro_tier() -> ModelTier {
    ModelTier::Haiku
}

fn default_text_backend() -> TextBackend {
    TextBackend::StandIn
}

fn default_render_backend() -> RenderBackend {
    RenderBackend::StandIn
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_anthropic_base_url() -> String {
    crate::anthropic::client::API_URL.to_string()
}

fn default_heygen_base_url() -> String {
    "https://api.heygen.com".to_string()
}

// Intervalo entre consultas de status da renderização: 5s.
fn default_render_poll_interval_ms() -> u64 {
    5_000
}

// Uma renderização de avatar raramente passa de 20 minutos.
fn default_render_timeout_secs() -> u64 {
    1_200
}

fn default_gcs_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_publish_dir() -> PathBuf {
    PathBuf::from("published")
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("lessonforge.db")
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("lessonforge")
}

fn default_stitch_timeout_secs() -> u64 {
    600
}

fn default_max_retained() -> usize {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            research: default_research_tier(),
            script: default_script_tier(),
            intro: default_intro_tier(),
        }
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            text: default_text_backend(),
            render: default_render_backend(),
            storage: default_storage_backend(),
            anthropic_api_key: String::new(),
            anthropic_base_url: default_anthropic_base_url(),
            heygen_api_key: String::new(),
            heygen_base_url: default_heygen_base_url(),
            render_poll_interval_ms: default_render_poll_interval_ms(),
            render_timeout_secs: default_render_timeout_secs(),
            gcs_access_token: String::new(),
            gcs_base_url: default_gcs_base_url(),
            bucket: String::new(),
            publish_dir: default_publish_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: default_cache_path(),
        }
    }
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: default_ffmpeg_bin(),
            scratch_dir: default_scratch_dir(),
            timeout_secs: default_stitch_timeout_secs(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
        }
    }
}

impl Default for LessonConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            region: default_region(),
            server: ServerConfig::default(),
            models: ModelConfig::default(),
            collaborators: CollaboratorConfig::default(),
            cache: CacheConfig::default(),
            stitcher: StitcherConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

impl LessonConfig {
    /// Carrega a configuração do caminho informado, ou de `lessonforge.toml`
    /// no diretório atual. Sem caminho explícito, usa valores padrão se o
    /// arquivo não existir; com caminho explícito, o arquivo é obrigatório.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config {}", p.display()))?;
                toml::from_str::<LessonConfig>(&contents)
                    .with_context(|| format!("invalid config {}", p.display()))?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    let contents = std::fs::read_to_string(default_path)?;
                    toml::from_str::<LessonConfig>(&contents)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_secrets(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo para os segredos.
    pub fn apply_secrets(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let collab = &mut self.collaborators;
        let slots = [
            ("ANTHROPIC_API_KEY", &mut collab.anthropic_api_key),
            ("HEYGEN_API_KEY", &mut collab.heygen_api_key),
            ("GCS_ACCESS_TOKEN", &mut collab.gcs_access_token),
        ];
        for (var, slot) in slots {
            if let Some(value) = lookup(var)
                && !value.is_empty()
            {
                *slot = value;
            }
        }
    }

    /// Rejeita backends `live`/`gcs` sem as credenciais correspondentes.
    pub fn validate(&self) -> Result<()> {
        let collab = &self.collaborators;
        if collab.text == TextBackend::Live && collab.anthropic_api_key.is_empty() {
            bail!("collaborators.text = \"live\" requires ANTHROPIC_API_KEY");
        }
        if collab.render == RenderBackend::Live && collab.heygen_api_key.is_empty() {
            bail!("collaborators.render = \"live\" requires HEYGEN_API_KEY");
        }
        if collab.storage == StorageBackend::Gcs && collab.gcs_access_token.is_empty() {
            bail!("collaborators.storage = \"gcs\" requires GCS_ACCESS_TOKEN");
        }
        if self.jobs.max_retained == 0 {
            bail!("jobs.max_retained must be at least 1");
        }
        Ok(())
    }

    /// Bucket efetivo: o configurado, ou `<project_id>-assets`.
    pub fn bucket(&self) -> String {
        if self.collaborators.bucket.trim().is_empty() {
            format!("{}-assets", self.project_id)
        } else {
            self.collaborators.bucket.clone()
        }
    }
}
