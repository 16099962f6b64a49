use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Level of detail a derivative was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeQuality {
    Thumb,
    Low,
    #[default]
    Medium,
    High,
    Highest,
    /// Reduced asset made for real-time AR rendering.
    #[serde(rename = "ar")]
    Ar,
}

/// Consumer a derivative was packaged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DerivativeUsage {
    /// glTF binary for the web viewer (and WebXR).
    #[default]
    #[serde(rename = "Web3D")]
    Web3D,
    /// glTF binary for native apps, used by Android Scene Viewer.
    #[serde(rename = "App3D")]
    App3D,
    /// USDZ for iOS AR Quick Look.
    #[serde(rename = "iOSApp3D")]
    IosApp3D,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivative {
    pub quality: DerivativeQuality,
    #[serde(default)]
    pub usage: DerivativeUsage,
    pub uri: String,
}

/// A model in the viewer scene together with every derivative available for it.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoyagerModel {
    pub name: String,
    pub derivatives: Vec<Derivative>,
    /// Quality currently rendered.
    #[serde(default)]
    pub quality: DerivativeQuality,
}

impl VoyagerModel {
    pub fn find(&self, quality: DerivativeQuality, usage: DerivativeUsage) -> Option<&Derivative> {
        self.derivatives
            .iter()
            .find(|d| d.quality == quality && d.usage == usage)
    }

    /// Web derivative to render at the current quality, or the first web
    /// derivative when that quality was never produced.
    pub fn render_derivative(&self) -> Option<&Derivative> {
        self.find(self.quality, DerivativeUsage::Web3D).or_else(|| {
            self.derivatives
                .iter()
                .find(|d| d.usage == DerivativeUsage::Web3D)
        })
    }

    /// AR-quality derivative for in-browser WebXR rendering.
    pub fn ar_derivative(&self) -> Option<&Derivative> {
        self.find(DerivativeQuality::Ar, DerivativeUsage::Web3D)
    }

    /// AR-quality glb packaged for Android Scene Viewer.
    pub fn android_derivative(&self) -> Option<&Derivative> {
        self.find(DerivativeQuality::Ar, DerivativeUsage::App3D)
    }

    /// AR-quality USDZ for iOS Quick Look.
    pub fn ios_derivative(&self) -> Option<&Derivative> {
        self.find(DerivativeQuality::Ar, DerivativeUsage::IosApp3D)
    }
}

/// JSON manifest describing the models of a scene, loaded as an asset.
#[derive(Debug, Clone, Serialize, Deserialize, Asset, TypePath)]
pub struct ModelManifest {
    pub title: String,
    pub models: Vec<VoyagerModel>,
    pub bounds: super::bounds::SceneBounds,
}

/// Load the glTF scene matching each model's quality whenever it changes.
pub fn sync_model_derivatives(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    models: Query<(Entity, &VoyagerModel), Changed<VoyagerModel>>,
) {
    for (entity, model) in &models {
        let Some(derivative) = model.render_derivative() else {
            warn!("Model '{}' has no web derivative", model.name);
            continue;
        };
        debug!("Model '{}' now renders {}", model.name, derivative.uri);
        commands.entity(entity).insert(SceneRoot(
            asset_server.load(GltfAssetLabel::Scene(0).from_asset(derivative.uri.clone())),
        ));
    }
}
