use crate::error::{BoothError, BoothResult};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKGROUND_BYTES: u64 = 32 * 1024 * 1024;

/// Background selection as made by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackgroundSpec {
    #[default]
    None,
    Blur,
    /// Local image path, `file://` URL or `http(s)://` URL.
    Image(String),
}

impl FromStr for BackgroundSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "none" => Self::None,
            "blur" => Self::Blur,
            other => Self::Image(other.to_string()),
        })
    }
}

impl fmt::Display for BackgroundSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Blur => write!(f, "blur"),
            Self::Image(source) => write!(f, "{}", source),
        }
    }
}

/// Pixels ready to sit behind the subject.
#[derive(Debug, Clone, Default)]
pub enum BackgroundLayer {
    #[default]
    None,
    Blur,
    /// Already scaled to the canvas.
    Image(RgbImage),
}

/// A resolved background: the requested spec and the layer actually drawn.
#[derive(Debug, Clone, Default)]
pub struct Backdrop {
    pub(super) spec: BackgroundSpec,
    pub(super) layer: BackgroundLayer,
}

impl Backdrop {
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolve `spec` for a `width`x`height` canvas.
    ///
    /// Images are decoded and scaled once here rather than on every tick.
    pub fn load(spec: &BackgroundSpec, width: u32, height: u32) -> BoothResult<Self> {
        let layer = match spec {
            BackgroundSpec::None => BackgroundLayer::None,
            BackgroundSpec::Blur => BackgroundLayer::Blur,
            BackgroundSpec::Image(source) => {
                let image = match locate(source)? {
                    Location::Local(path) => {
                        tracing::info!("Loading background image from {}", path);
                        image::open(path).map_err(|err| BoothError::BackgroundLoad {
                            path: path.to_string(),
                            source: err,
                        })?
                    }
                    Location::Remote(url) => {
                        tracing::info!("Fetching background image from {}", url);
                        let bytes = fetch(url)?;
                        image::load_from_memory(&bytes).map_err(|err| {
                            BoothError::BackgroundLoad {
                                path: url.to_string(),
                                source: err,
                            }
                        })?
                    }
                }
                .to_rgb8();

                tracing::info!(
                    "Background image {}x{} scaled to {}x{}",
                    image.width(),
                    image.height(),
                    width,
                    height
                );
                BackgroundLayer::Image(imageops::resize(
                    &image,
                    width,
                    height,
                    FilterType::Triangle,
                ))
            }
        };

        Ok(Self {
            spec: spec.clone(),
            layer,
        })
    }

    /// Resolve `spec`, falling back to no background when it cannot be loaded.
    ///
    /// The load error is handed back so the caller can report it.
    pub fn load_or_none(
        spec: &BackgroundSpec,
        width: u32,
        height: u32,
    ) -> (Self, Option<BoothError>) {
        match Self::load(spec, width, height) {
            Ok(backdrop) => (backdrop, None),
            Err(err) => (Self::none(), Some(err)),
        }
    }

    pub fn spec(&self) -> &BackgroundSpec {
        &self.spec
    }

    pub fn layer(&self) -> &BackgroundLayer {
        &self.layer
    }

    pub fn is_none(&self) -> bool {
        matches!(self.layer, BackgroundLayer::None)
    }
}

enum Location<'a> {
    Local(&'a str),
    Remote(&'a str),
}

fn locate(source: &str) -> BoothResult<Location<'_>> {
    if let Some(path) = source.strip_prefix("file://") {
        return Ok(Location::Local(path));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(Location::Remote(source));
    }
    if source.contains("://") {
        return Err(BoothError::UnsupportedBackground(source.to_string()));
    }
    Ok(Location::Local(source))
}

/// Download a remote background in one blocking request.
fn fetch(url: &str) -> BoothResult<Vec<u8>> {
    let fetch_error = |source: Box<dyn std::error::Error + Send + Sync>| {
        BoothError::BackgroundFetch {
            url: url.to_string(),
            source,
        }
    };

    let response = ureq::get(url)
        .timeout(FETCH_TIMEOUT)
        .call()
        .map_err(|err| fetch_error(Box::new(err)))?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_BACKGROUND_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| fetch_error(Box::new(err)))?;

    tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}
