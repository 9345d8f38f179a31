//! Label records: the structured content of one print job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EtiquetaError, Result};
use crate::ir::GraphicSource;
use crate::protocol::barcode::Symbology;

/// Which fixed skeleton a label is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemplateKind {
    #[default]
    #[serde(alias = "STANDARD_PRICE_LABEL")]
    StandardPrice,
    #[serde(alias = "FOOD_INFO_LABEL")]
    FoodInfo,
    #[serde(alias = "OTHER_LABEL")]
    Other,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [Self::StandardPrice, Self::FoodInfo, Self::Other];

    pub fn name(self) -> &'static str {
        match self {
            Self::StandardPrice => "standard-price",
            Self::FoodInfo => "food-info",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemplateKind {
    type Err = EtiquetaError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "standardprice" | "standardpricelabel" | "price" => Ok(Self::StandardPrice),
            "foodinfo" | "foodinfolabel" | "food" => Ok(Self::FoodInfo),
            "other" | "otherlabel" => Ok(Self::Other),
            _ => Err(EtiquetaError::Unexpected(format!("unknown template {:?}", s))),
        }
    }
}

/// Label media loaded in the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LabelStock {
    /// Continuous roll; labels are separated by line feeds
    #[default]
    Continuous,
    /// Die-cut 50 x 30 mm labels; advanced with a form feed
    Die50x30,
}

impl LabelStock {
    /// Tallest barcode that fits the stock, if limited.
    pub fn max_barcode_height(self) -> Option<u16> {
        match self {
            Self::Continuous => None,
            Self::Die50x30 => Some(40),
        }
    }
}

impl FromStr for LabelStock {
    type Err = EtiquetaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "continuous" | "default" => Ok(Self::Continuous),
            "50x30" | "die50x30" | "die-50x30" => Ok(Self::Die50x30),
            _ => Err(EtiquetaError::Unexpected(format!("unknown label stock {:?}", s))),
        }
    }
}

/// Content of one label.
///
/// Field names also accept the `itemPrice` / `itemDescription` /
/// `barcodeTypeCode` / `barcodeInput` keys used by point-of-sale front ends.
///
/// ```
/// use etiqueta::label::{LabelRecord, TemplateKind};
/// use etiqueta::protocol::Symbology;
///
/// let record = LabelRecord::new(TemplateKind::StandardPrice)
///     .price("$4.99")
///     .description("Apple 1kg")
///     .barcode(Symbology::Code128, "12345");
///
/// assert_eq!(record.item_price, "$4.99");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRecord {
    pub template: TemplateKind,
    #[serde(alias = "itemPrice")]
    pub item_price: String,
    #[serde(alias = "itemDescription")]
    pub item_description: String,
    #[serde(alias = "barcodeTypeCode")]
    pub barcode_type: Symbology,
    #[serde(alias = "barcodeInput")]
    pub barcode_value: String,
    pub stock: LabelStock,
    /// Overrides the profile's `DefaultBarcodeHeight`
    pub barcode_height: Option<u16>,
    /// Overrides the profile's `DefaultBarcodeXOffset`
    pub barcode_x_offset: Option<u16>,
    #[serde(skip)]
    pub logo: Option<GraphicSource>,
}

impl Default for LabelRecord {
    fn default() -> Self {
        Self::new(TemplateKind::default())
    }
}

impl LabelRecord {
    pub fn new(template: TemplateKind) -> Self {
        Self {
            template,
            item_price: String::new(),
            item_description: String::new(),
            barcode_type: Symbology::Code128,
            barcode_value: String::new(),
            stock: LabelStock::default(),
            barcode_height: None,
            barcode_x_offset: None,
            logo: None,
        }
    }

    /// Parse a JSON record.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| EtiquetaError::Unexpected(format!("invalid label record: {}", e)))
    }

    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.item_price = price.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.item_description = description.into();
        self
    }

    pub fn barcode(mut self, symbology: Symbology, value: impl Into<String>) -> Self {
        self.barcode_type = symbology;
        self.barcode_value = value.into();
        self
    }

    pub fn stock(mut self, stock: LabelStock) -> Self {
        self.stock = stock;
        self
    }

    pub fn barcode_height(mut self, dots: u16) -> Self {
        self.barcode_height = Some(dots);
        self
    }

    pub fn barcode_x_offset(mut self, dots: u16) -> Self {
        self.barcode_x_offset = Some(dots);
        self
    }

    pub fn logo(mut self, source: GraphicSource) -> Self {
        self.logo = Some(source);
        self
    }
}
