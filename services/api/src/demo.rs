use crate::infra::DryRunFacebook;
use agent_publisher::error::AppError;
use agent_publisher::publishing::{
    AgentId, AgentRegistration, ChannelId, FacebookPageId, InMemoryStore, LanguageCode,
    PageConnectionPayload, PreferenceUpdate, Property, PropertyDraft, PropertyTranslation,
    PublishingRequest, PublishingService, PublishingSnapshot,
};
use clap::Args;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = PublishingService<InMemoryStore, DryRunFacebook>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Display name for the demo agent; the public slug is derived from it.
    #[arg(long, default_value = "Priya Sharma")]
    pub(crate) agent_name: String,
    /// Target languages, primary first (comma separated codes).
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "en,mr,hi,gu",
        value_parser = parse_language
    )]
    pub(crate) languages: Vec<LanguageCode>,
    /// Optional CSV of listings to import instead of the built-in sample.
    #[arg(long)]
    pub(crate) properties_csv: Option<PathBuf>,
    /// Leave the first listing published instead of unpublishing it at the end.
    #[arg(long)]
    pub(crate) keep_published: bool,
}

fn parse_language(raw: &str) -> Result<LanguageCode, String> {
    raw.parse::<LanguageCode>().map_err(|err| err.to_string())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        agent_name,
        languages,
        properties_csv,
        keep_published,
    } = args;

    let facebook = DryRunFacebook::default();
    let service = PublishingService::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(facebook.clone()),
    );

    println!("Listing publishing demo (Facebook calls are dry-run)");
    let agent = service.register_agent(AgentRegistration {
        name: agent_name,
        bio: Some("Residential specialist, Mumbai western suburbs".to_string()),
        is_public: true,
        ..AgentRegistration::default()
    })?;
    println!("- Registered agent {} -> /agent-public/{}", agent.name, agent.slug);

    let page_languages = [LanguageCode::En, LanguageCode::Hi];
    let pages = service.connect_pages(
        &agent.id,
        page_languages
            .iter()
            .map(|language| PageConnectionPayload {
                page_id: format!("demo-page-{}", language.code()),
                page_name: Some(format!("{} ({})", agent.name, language.name())),
                access_token: format!("dry-run-token-{}", language.code()),
            })
            .collect(),
    )?;
    println!("- Connected {} Facebook pages", pages.len());

    let Some((primary, secondaries)) = languages.split_first() else {
        println!("  No target languages given; nothing to publish");
        return Ok(());
    };
    let mappings: BTreeMap<LanguageCode, FacebookPageId> = page_languages
        .iter()
        .map(|language| {
            (
                *language,
                FacebookPageId(format!("demo-page-{}", language.code())),
            )
        })
        .collect();
    let preference = service.set_preferences(
        &agent.id,
        PreferenceUpdate {
            primary_language: *primary,
            secondary_languages: secondaries
                .iter()
                .copied()
                .filter(|language| language != primary)
                .collect(),
            facebook_page_mappings: mappings,
            auto_translate_enabled: false,
        },
    )?;
    let codes: Vec<&str> = preference
        .languages()
        .iter()
        .map(|language| language.code())
        .collect();
    println!("- Language preferences: {}", codes.join(", "));

    let properties = load_properties(&service, &agent.id, properties_csv)?;
    println!("- {} draft listing(s) ready", properties.len());

    let channels = vec![ChannelId::Website, ChannelId::Facebook, ChannelId::Instagram];
    for property in &properties {
        let request =
            PublishingRequest::new(property.id.clone(), languages.clone(), channels.clone());
        let snapshot = service.publish(&agent.id, request).await?;
        render_snapshot(&property.listing.title, &snapshot);
    }

    let profile = service.public_profile(&agent.slug)?;
    println!(
        "\nPublic website for {} shows {} listing(s)",
        profile.name,
        profile.properties.len()
    );
    if let Some(listing) = profile.properties.first() {
        match serde_json::to_string_pretty(listing) {
            Ok(json) => println!("  First listing payload:\n{}", json),
            Err(err) => println!("  First listing payload unavailable: {}", err),
        }
    }

    let posts = facebook.posts();
    if posts.is_empty() {
        println!("  Facebook posts: none attempted");
    } else {
        println!("  Facebook posts (dry-run):");
        for post in posts {
            let headline = post.message.lines().next().unwrap_or_default();
            println!("    - page={} -> {}", post.page_id.0, headline);
        }
    }

    if keep_published {
        return Ok(());
    }
    if let Some(first) = properties.first() {
        let outcome = service.unpublish(&agent.id, &first.id).await?;
        let remaining = service.public_profile(&agent.slug)?.properties.len();
        println!(
            "\nUnpublished {} -> status {} ({} listing(s) still public)",
            outcome.property_id.0,
            outcome.status.label(),
            remaining
        );
    }

    Ok(())
}

fn load_properties(
    service: &DemoService,
    agent_id: &AgentId,
    csv_path: Option<PathBuf>,
) -> Result<Vec<Property>, AppError> {
    match csv_path {
        Some(path) => {
            let file = File::open(path)?;
            Ok(service.import_properties(agent_id, file)?)
        }
        None => Ok(vec![service.create_property(agent_id, sample_listing())?]),
    }
}

fn sample_listing() -> PropertyDraft {
    let mut translations = BTreeMap::new();
    translations.insert(
        LanguageCode::Mr,
        PropertyTranslation {
            title: "समुद्राभिमुख 2BHK सदनिका".to_string(),
            description: Some("वांद्रे पश्चिम येथील प्रशस्त सदनिका".to_string()),
        },
    );
    translations.insert(
        LanguageCode::Hi,
        PropertyTranslation {
            title: "समुद्र के सामने 2BHK फ्लैट".to_string(),
            description: Some("बांद्रा पश्चिम में विशाल फ्लैट".to_string()),
        },
    );

    PropertyDraft {
        title: "Sea-facing 2BHK apartment".to_string(),
        description: "Spacious corner flat with a balcony, five minutes from Carter Road"
            .to_string(),
        price: 24_500_000.0,
        location: "Bandra West, Mumbai".to_string(),
        bedrooms: Some(2),
        bathrooms: Some(2.0),
        area_sqft: Some(1_050),
        property_type: Some("apartment".to_string()),
        images: vec!["https://images.example.com/bandra-2bhk/front.jpg".to_string()],
        translations,
    }
}

fn render_snapshot(title: &str, snapshot: &PublishingSnapshot) {
    println!(
        "\nPublished '{}' ({}) -> {}",
        title,
        snapshot.property_id.0,
        snapshot.publishing_status.label()
    );
    let channels: Vec<&str> = snapshot
        .published_channels
        .iter()
        .map(|channel| channel.code())
        .collect();
    println!("  Live on: {}", channels.join(", "));
    for (language, status) in &snapshot.language_status {
        println!("  - {}: {}", language.name(), status.label());
        for (channel, results) in &snapshot.channel_results {
            if let Some(result) = results.get(language) {
                println!("      {}: {}", channel.code(), result.label());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn demo_args(properties_csv: Option<PathBuf>) -> DemoArgs {
        DemoArgs {
            agent_name: "Demo Agent".to_string(),
            languages: vec![LanguageCode::En, LanguageCode::Gu],
            properties_csv,
            keep_published: false,
        }
    }

    #[tokio::test]
    async fn demo_runs_with_the_sample_listing() {
        run_demo(demo_args(None)).await.expect("demo completes");
    }

    #[tokio::test]
    async fn demo_imports_listings_from_csv() {
        let path = std::env::temp_dir().join(format!(
            "agent-publisher-demo-{}.csv",
            std::process::id()
        ));
        let mut file = File::create(&path).expect("temp csv");
        writeln!(
            file,
            "title,description,price,location,bedrooms,bathrooms,area_sqft,property_type,image_url"
        )
        .expect("header");
        writeln!(file, "Garden row house,Quiet lane,9500000,Pune,3,2,1400,house,").expect("row");
        drop(file);

        let result = run_demo(demo_args(Some(path.clone()))).await;
        let _ = std::fs::remove_file(&path);
        result.expect("demo completes");
    }

    #[tokio::test]
    async fn missing_csv_surfaces_io_error() {
        let err = run_demo(demo_args(Some(PathBuf::from("/nonexistent/listings.csv"))))
            .await
            .expect_err("file missing");
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn language_parser_rejects_unknown_codes() {
        assert_eq!(parse_language("hi"), Ok(LanguageCode::Hi));
        assert!(parse_language("fr").is_err());
    }
}
