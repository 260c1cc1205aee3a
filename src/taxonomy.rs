//! # Taxonomy
//!
//! Closed vocabulary of categories and topics. Both are plain enums; nothing
//! widens them at runtime. Declaration order is the canonical ordering used for
//! tie-breaking and report sorting.
//!
//! Cue words feed the heuristic annotator's category/topic suggestions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Technology,
    Business,
    Politics,
    Health,
    Sports,
    Entertainment,
    Science,
    Environment,
    Education,
    Travel,
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Technology,
        Category::Business,
        Category::Politics,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
        Category::Science,
        Category::Environment,
        Category::Education,
        Category::Travel,
        Category::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Business => "Business",
            Category::Politics => "Politics",
            Category::Health => "Health",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::Science => "Science",
            Category::Environment => "Environment",
            Category::Education => "Education",
            Category::Travel => "Travel",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive exact lookup by canonical name.
    pub fn from_name(name: &str) -> Option<Category> {
        let n = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(n))
    }

    pub fn topics(self) -> impl Iterator<Item = Topic> {
        Topic::ALL.into_iter().filter(move |t| t.category() == self)
    }

    /// Alternative spellings an LLM tends to produce, mapped to the canonical category.
    pub(crate) fn aliases() -> &'static [(&'static str, Category)] {
        &[
            ("tech", Category::Technology),
            ("it", Category::Technology),
            ("science & technology", Category::Technology),
            ("finance", Category::Business),
            ("economy", Category::Business),
            ("economics", Category::Business),
            ("markets", Category::Business),
            ("government", Category::Politics),
            ("world", Category::Politics),
            ("policy", Category::Politics),
            ("medicine", Category::Health),
            ("healthcare", Category::Health),
            ("sport", Category::Sports),
            ("culture", Category::Entertainment),
            ("arts", Category::Entertainment),
            ("research", Category::Science),
            ("climate", Category::Environment),
            ("energy", Category::Environment),
            ("schools", Category::Education),
            ("tourism", Category::Travel),
            ("general", Category::Other),
            ("misc", Category::Other),
        ]
    }

    pub(crate) fn cues(self) -> &'static [&'static str] {
        match self {
            Category::Technology => &[
                "technology", "tech", "software", "ai", "app", "apps", "chip", "chips",
                "computer", "internet", "smartphone", "startup", "cyber", "digital", "robot",
            ],
            Category::Business => &[
                "business", "market", "markets", "stock", "stocks", "shares", "investors",
                "earnings", "revenue", "profit", "economy", "company", "companies", "bank",
                "trade", "inflation",
            ],
            Category::Politics => &[
                "election", "elections", "government", "senate", "congress", "president",
                "minister", "parliament", "policy", "vote", "law", "campaign", "diplomat",
            ],
            Category::Health => &[
                "health", "hospital", "vaccine", "disease", "patients", "doctors", "medical",
                "virus", "cancer", "drug", "treatment", "outbreak",
            ],
            Category::Sports => &[
                "game", "match", "season", "league", "team", "coach", "championship",
                "football", "soccer", "basketball", "tennis", "olympic", "olympics", "tournament",
            ],
            Category::Entertainment => &[
                "film", "movie", "music", "album", "concert", "celebrity", "television",
                "show", "streaming", "actor", "actress", "festival", "game", "gaming",
            ],
            Category::Science => &[
                "science", "scientists", "research", "study", "space", "nasa", "physics",
                "biology", "discovery", "telescope", "experiment", "species",
            ],
            Category::Environment => &[
                "climate", "environment", "emissions", "carbon", "renewable", "solar",
                "wind", "pollution", "wildlife", "drought", "flood", "wildfire",
            ],
            Category::Education => &[
                "school", "schools", "students", "teachers", "university", "universities",
                "college", "education", "campus", "tuition", "curriculum",
            ],
            Category::Travel => &[
                "travel", "airline", "airlines", "flight", "flights", "airport", "tourism",
                "tourists", "hotel", "hotels", "vacation", "cruise",
            ],
            Category::Other => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-classification nested under exactly one [`Category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "Artificial Intelligence")]
    ArtificialIntelligence,
    #[serde(rename = "Cybersecurity")]
    Cybersecurity,
    #[serde(rename = "Consumer Electronics")]
    ConsumerElectronics,
    #[serde(rename = "Semiconductors")]
    Semiconductors,
    #[serde(rename = "Markets")]
    Markets,
    #[serde(rename = "Economy")]
    Economy,
    #[serde(rename = "Startups")]
    Startups,
    #[serde(rename = "Mergers & Acquisitions")]
    MergersAcquisitions,
    #[serde(rename = "Elections")]
    Elections,
    #[serde(rename = "Legislation")]
    Legislation,
    #[serde(rename = "International Relations")]
    InternationalRelations,
    #[serde(rename = "Public Health")]
    PublicHealth,
    #[serde(rename = "Medical Research")]
    MedicalResearch,
    #[serde(rename = "Mental Health")]
    MentalHealth,
    #[serde(rename = "Football")]
    Football,
    #[serde(rename = "Basketball")]
    Basketball,
    #[serde(rename = "Olympics")]
    Olympics,
    #[serde(rename = "Film")]
    Film,
    #[serde(rename = "Music")]
    Music,
    #[serde(rename = "Gaming")]
    Gaming,
    #[serde(rename = "Space Exploration")]
    SpaceExploration,
    #[serde(rename = "Physics")]
    Physics,
    #[serde(rename = "Biology")]
    Biology,
    #[serde(rename = "Climate Change")]
    ClimateChange,
    #[serde(rename = "Renewable Energy")]
    RenewableEnergy,
    #[serde(rename = "Conservation")]
    Conservation,
    #[serde(rename = "Higher Education")]
    HigherEducation,
    #[serde(rename = "K-12 Education")]
    Schools,
    #[serde(rename = "Education Technology")]
    EdTech,
    #[serde(rename = "Aviation")]
    Aviation,
    #[serde(rename = "Tourism")]
    Tourism,
}

impl Topic {
    pub const ALL: [Topic; 31] = [
        Topic::ArtificialIntelligence,
        Topic::Cybersecurity,
        Topic::ConsumerElectronics,
        Topic::Semiconductors,
        Topic::Markets,
        Topic::Economy,
        Topic::Startups,
        Topic::MergersAcquisitions,
        Topic::Elections,
        Topic::Legislation,
        Topic::InternationalRelations,
        Topic::PublicHealth,
        Topic::MedicalResearch,
        Topic::MentalHealth,
        Topic::Football,
        Topic::Basketball,
        Topic::Olympics,
        Topic::Film,
        Topic::Music,
        Topic::Gaming,
        Topic::SpaceExploration,
        Topic::Physics,
        Topic::Biology,
        Topic::ClimateChange,
        Topic::RenewableEnergy,
        Topic::Conservation,
        Topic::HigherEducation,
        Topic::Schools,
        Topic::EdTech,
        Topic::Aviation,
        Topic::Tourism,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Topic::ArtificialIntelligence => "Artificial Intelligence",
            Topic::Cybersecurity => "Cybersecurity",
            Topic::ConsumerElectronics => "Consumer Electronics",
            Topic::Semiconductors => "Semiconductors",
            Topic::Markets => "Markets",
            Topic::Economy => "Economy",
            Topic::Startups => "Startups",
            Topic::MergersAcquisitions => "Mergers & Acquisitions",
            Topic::Elections => "Elections",
            Topic::Legislation => "Legislation",
            Topic::InternationalRelations => "International Relations",
            Topic::PublicHealth => "Public Health",
            Topic::MedicalResearch => "Medical Research",
            Topic::MentalHealth => "Mental Health",
            Topic::Football => "Football",
            Topic::Basketball => "Basketball",
            Topic::Olympics => "Olympics",
            Topic::Film => "Film",
            Topic::Music => "Music",
            Topic::Gaming => "Gaming",
            Topic::SpaceExploration => "Space Exploration",
            Topic::Physics => "Physics",
            Topic::Biology => "Biology",
            Topic::ClimateChange => "Climate Change",
            Topic::RenewableEnergy => "Renewable Energy",
            Topic::Conservation => "Conservation",
            Topic::HigherEducation => "Higher Education",
            Topic::Schools => "K-12 Education",
            Topic::EdTech => "Education Technology",
            Topic::Aviation => "Aviation",
            Topic::Tourism => "Tourism",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Topic::ArtificialIntelligence
            | Topic::Cybersecurity
            | Topic::ConsumerElectronics
            | Topic::Semiconductors => Category::Technology,
            Topic::Markets | Topic::Economy | Topic::Startups | Topic::MergersAcquisitions => {
                Category::Business
            }
            Topic::Elections | Topic::Legislation | Topic::InternationalRelations => {
                Category::Politics
            }
            Topic::PublicHealth | Topic::MedicalResearch | Topic::MentalHealth => Category::Health,
            Topic::Football | Topic::Basketball | Topic::Olympics => Category::Sports,
            Topic::Film | Topic::Music | Topic::Gaming => Category::Entertainment,
            Topic::SpaceExploration | Topic::Physics | Topic::Biology => Category::Science,
            Topic::ClimateChange | Topic::RenewableEnergy | Topic::Conservation => {
                Category::Environment
            }
            Topic::HigherEducation | Topic::Schools | Topic::EdTech => Category::Education,
            Topic::Aviation | Topic::Tourism => Category::Travel,
        }
    }

    pub fn from_name(name: &str) -> Option<Topic> {
        let n = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(n))
    }

    pub(crate) fn aliases() -> &'static [(&'static str, Topic)] {
        &[
            ("ai", Topic::ArtificialIntelligence),
            ("machine learning", Topic::ArtificialIntelligence),
            ("generative ai", Topic::ArtificialIntelligence),
            ("security", Topic::Cybersecurity),
            ("hacking", Topic::Cybersecurity),
            ("gadgets", Topic::ConsumerElectronics),
            ("chips", Topic::Semiconductors),
            ("stock market", Topic::Markets),
            ("finance", Topic::Markets),
            ("macroeconomics", Topic::Economy),
            ("venture capital", Topic::Startups),
            ("m&a", Topic::MergersAcquisitions),
            ("mergers", Topic::MergersAcquisitions),
            ("acquisitions", Topic::MergersAcquisitions),
            ("foreign policy", Topic::InternationalRelations),
            ("diplomacy", Topic::InternationalRelations),
            ("soccer", Topic::Football),
            ("nba", Topic::Basketball),
            ("movies", Topic::Film),
            ("cinema", Topic::Film),
            ("video games", Topic::Gaming),
            ("space", Topic::SpaceExploration),
            ("astronomy", Topic::SpaceExploration),
            ("climate", Topic::ClimateChange),
            ("global warming", Topic::ClimateChange),
            ("clean energy", Topic::RenewableEnergy),
            ("wildlife", Topic::Conservation),
            ("universities", Topic::HigherEducation),
            ("edtech", Topic::EdTech),
            ("airlines", Topic::Aviation),
        ]
    }

    pub(crate) fn cues(self) -> &'static [&'static str] {
        match self {
            Topic::ArtificialIntelligence => &["ai", "artificial", "intelligence", "chatbot", "openai", "model", "models"],
            Topic::Cybersecurity => &["hack", "hackers", "breach", "ransomware", "malware", "cyberattack"],
            Topic::ConsumerElectronics => &["smartphone", "iphone", "laptop", "gadget", "headphones", "tablet"],
            Topic::Semiconductors => &["chip", "chips", "semiconductor", "nvidia", "tsmc", "foundry"],
            Topic::Markets => &["stock", "stocks", "shares", "index", "investors", "nasdaq", "dow"],
            Topic::Economy => &["inflation", "gdp", "unemployment", "recession", "rates", "economy"],
            Topic::Startups => &["startup", "startups", "funding", "founders", "seed", "venture"],
            Topic::MergersAcquisitions => &["merger", "acquisition", "acquire", "acquires", "takeover", "deal"],
            Topic::Elections => &["election", "elections", "vote", "voters", "ballot", "campaign", "poll"],
            Topic::Legislation => &["bill", "law", "senate", "congress", "parliament", "legislation"],
            Topic::InternationalRelations => &["diplomat", "summit", "sanctions", "treaty", "embassy", "ally"],
            Topic::PublicHealth => &["outbreak", "vaccine", "pandemic", "virus", "cdc", "who"],
            Topic::MedicalResearch => &["trial", "clinical", "cancer", "treatment", "drug", "therapy"],
            Topic::MentalHealth => &["mental", "depression", "anxiety", "wellbeing", "suicide", "therapy"],
            Topic::Football => &["football", "soccer", "goal", "striker", "premier", "nfl"],
            Topic::Basketball => &["basketball", "nba", "playoffs", "dunk", "court"],
            Topic::Olympics => &["olympic", "olympics", "medal", "athletes"],
            Topic::Film => &["film", "movie", "box", "director", "oscar", "cinema"],
            Topic::Music => &["music", "album", "song", "concert", "tour", "singer"],
            Topic::Gaming => &["gaming", "console", "playstation", "xbox", "nintendo", "esports"],
            Topic::SpaceExploration => &["space", "nasa", "rocket", "mars", "moon", "orbit", "telescope"],
            Topic::Physics => &["physics", "quantum", "particle", "fusion", "physicists"],
            Topic::Biology => &["biology", "species", "gene", "genetic", "cells", "evolution"],
            Topic::ClimateChange => &["climate", "warming", "emissions", "carbon", "heatwave"],
            Topic::RenewableEnergy => &["solar", "wind", "renewable", "battery", "batteries", "geothermal"],
            Topic::Conservation => &["wildlife", "conservation", "endangered", "habitat", "forest"],
            Topic::HigherEducation => &["university", "universities", "college", "campus", "tuition"],
            Topic::Schools => &["school", "schools", "teachers", "pupils", "classroom"],
            Topic::EdTech => &["edtech", "online", "learning", "platform", "courses"],
            Topic::Aviation => &["airline", "airlines", "flight", "flights", "airport", "boeing", "airbus"],
            Topic::Tourism => &["tourism", "tourists", "hotel", "hotels", "vacation", "cruise"],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
