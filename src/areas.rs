use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// A suburb and its postcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    /// Lowercase, hyphen-separated key, e.g. "st-lucia".
    pub key: String,
    pub postcode: String,
}

impl Area {
    pub fn new(key: &str, postcode: &str) -> Self {
        Self {
            key: normalize_key(key),
            postcode: postcode.trim().to_string(),
        }
    }

    /// "st-lucia" -> "St Lucia"
    pub fn display_name(&self) -> String {
        self.key
            .split('-')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Space-separated form used by the search API, e.g. "st lucia".
    pub fn query_name(&self) -> String {
        self.key.replace('-', " ")
    }
}

/// "St Lucia" / "st lucia" / "St-Lucia" -> "st-lucia"
pub fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Immutable area -> postcode lookup, iterated in key order.
#[derive(Debug, Clone, Default)]
pub struct AreaTable {
    areas: BTreeMap<String, String>,
}

impl AreaTable {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let areas = pairs
            .into_iter()
            .map(|(key, postcode)| (normalize_key(key), postcode.trim().to_string()))
            .collect();
        Self { areas }
    }

    /// Load a JSON object of `{"area-key": "postcode"}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read area table {}", path.display()))?;
        let raw: BTreeMap<String, String> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid area table {}", path.display()))?;
        if raw.is_empty() {
            bail!("Area table {} is empty", path.display());
        }
        Ok(Self::from_pairs(
            raw.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }

    /// Brisbane metropolitan suburbs.
    pub fn brisbane() -> Self {
        Self::from_pairs(BRISBANE_SUBURBS.iter().copied())
    }

    pub fn get(&self, name: &str) -> Option<Area> {
        let key = normalize_key(name);
        self.areas
            .get(&key)
            .map(|postcode| Area::new(&key, postcode))
    }

    /// Look up an area, or build one from an explicit postcode override.
    pub fn resolve(&self, name: &str, postcode: Option<&str>) -> Result<Area> {
        match postcode {
            Some(postcode) if !postcode.trim().is_empty() => Ok(Area::new(name, postcode)),
            _ => self
                .get(name)
                .with_context(|| format!("Unknown area '{}'", name)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Area> + '_ {
        self.areas
            .iter()
            .map(|(key, postcode)| Area::new(key, postcode))
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

const BRISBANE_SUBURBS: &[(&str, &str)] = &[
    // Inner Brisbane
    ("paddington", "4064"),
    ("red-hill", "4059"),
    ("kelvin-grove", "4059"),
    ("new-farm", "4005"),
    ("teneriffe", "4005"),
    ("fortitude-valley", "4006"),
    ("west-end", "4101"),
    ("south-brisbane", "4101"),
    ("woolloongabba", "4102"),
    ("kangaroo-point", "4169"),
    ("east-brisbane", "4169"),
    ("highgate-hill", "4101"),
    ("milton", "4064"),
    ("petrie-terrace", "4000"),
    ("spring-hill", "4000"),
    ("herston", "4006"),
    ("newstead", "4006"),
    ("bowen-hills", "4006"),
    // Northern
    ("chermside", "4032"),
    ("kedron", "4031"),
    ("stafford", "4053"),
    ("stafford-heights", "4053"),
    ("everton-park", "4053"),
    ("mitchelton", "4053"),
    ("aspley", "4034"),
    ("geebung", "4034"),
    ("zillmere", "4034"),
    ("bracken-ridge", "4017"),
    ("sandgate", "4017"),
    ("shorncliffe", "4017"),
    ("brighton", "4017"),
    ("deagon", "4017"),
    ("nundah", "4012"),
    ("wavell-heights", "4012"),
    ("northgate", "4013"),
    ("banyo", "4014"),
    ("nudgee", "4014"),
    ("virginia", "4014"),
    ("albany-creek", "4035"),
    ("bridgeman-downs", "4035"),
    ("mcdowall", "4053"),
    ("everton-hills", "4053"),
    ("arana-hills", "4054"),
    // Southern
    ("mount-gravatt", "4122"),
    ("mount-gravatt-east", "4122"),
    ("holland-park", "4121"),
    ("holland-park-west", "4121"),
    ("tarragindi", "4121"),
    ("annerley", "4103"),
    ("greenslopes", "4120"),
    ("coorparoo", "4151"),
    ("camp-hill", "4152"),
    ("carindale", "4152"),
    ("carina", "4152"),
    ("carina-heights", "4152"),
    ("sunnybank", "4109"),
    ("sunnybank-hills", "4109"),
    ("robertson", "4109"),
    ("eight-mile-plains", "4113"),
    ("macgregor", "4109"),
    ("mansfield", "4122"),
    ("wishart", "4122"),
    ("upper-mount-gravatt", "4122"),
    ("rochedale-south", "4123"),
    // Western
    ("indooroopilly", "4068"),
    ("st-lucia", "4067"),
    ("toowong", "4066"),
    ("auchenflower", "4066"),
    ("bardon", "4065"),
    ("ashgrove", "4060"),
    ("the-gap", "4061"),
    ("keperra", "4054"),
    ("ferny-grove", "4055"),
    ("fig-tree-pocket", "4069"),
    ("kenmore", "4069"),
    ("kenmore-hills", "4069"),
    ("chapel-hill", "4069"),
    ("brookfield", "4069"),
    ("pullenvale", "4069"),
    ("taringa", "4068"),
    ("graceville", "4075"),
    ("sherwood", "4075"),
    ("corinda", "4075"),
    ("oxley", "4075"),
    // Eastern
    ("wynnum", "4178"),
    ("wynnum-west", "4178"),
    ("manly", "4179"),
    ("manly-west", "4179"),
    ("lota", "4179"),
    ("capalaba", "4157"),
    ("cleveland", "4163"),
    ("victoria-point", "4165"),
    ("thornlands", "4164"),
    ("birkdale", "4159"),
    ("wellington-point", "4160"),
    ("ormiston", "4160"),
    ("thorneside", "4158"),
    ("cannon-hill", "4170"),
    ("morningside", "4170"),
    ("bulimba", "4171"),
    ("hawthorne", "4171"),
    ("balmoral", "4171"),
    ("murarrie", "4172"),
    // Moreton Bay
    ("redcliffe", "4020"),
    ("margate", "4019"),
    ("scarborough", "4020"),
    ("clontarf", "4019"),
    ("woody-point", "4019"),
    ("north-lakes", "4509"),
    ("mango-hill", "4509"),
    ("kallangur", "4503"),
    ("petrie", "4502"),
    ("strathpine", "4500"),
    ("brendale", "4500"),
    ("warner", "4500"),
    ("cashmere", "4500"),
    ("lawnton", "4501"),
    ("griffin", "4503"),
    ("murrumba-downs", "4503"),
    ("deception-bay", "4508"),
    ("rothwell", "4022"),
    ("kippa-ring", "4021"),
    // Logan / Gold Coast corridor
    ("springwood", "4127"),
    ("underwood", "4119"),
    ("slacks-creek", "4127"),
    ("logan-central", "4114"),
    ("beenleigh", "4207"),
    ("ormeau", "4208"),
    ("pimpama", "4209"),
    ("coomera", "4209"),
    ("upper-coomera", "4209"),
    ("helensvale", "4212"),
    ("pacific-pines", "4211"),
    ("southport", "4215"),
    ("surfers-paradise", "4217"),
    ("broadbeach", "4218"),
    ("burleigh-heads", "4220"),
    ("palm-beach", "4221"),
    ("currumbin", "4223"),
    ("coolangatta", "4225"),
    ("robina", "4226"),
    ("varsity-lakes", "4227"),
    ("mudgeeraba", "4213"),
    ("nerang", "4211"),
    ("labrador", "4215"),
    ("runaway-bay", "4216"),
    ("hope-island", "4212"),
];
