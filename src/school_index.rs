//! Discovery of the schools that fielded a team in a season.

use std::path::Path;

use anyhow::{bail, Context};
use fs_err::File;
use itertools::Itertools;
use log::info;
use roster_scraping_utils::fs_util::create_parent_dir;
use roster_scraping_utils::{regex, selector};
use scraper::{ElementRef, Html};

use crate::api::{FetchedPage, RosterClient};
use crate::schema::{School, Season, Sport};

/// Slug of the school a link points to, if it is a team page of `sport` in `season`.
fn school_slug_of(href: &str, sport: Sport, season: Season) -> Option<String> {
    let (slug, sport_part, year) = if let Some(captures) =
        regex!(r"/cbb/schools/([^/]+)/(men|women)/(\d{4})\.html").captures(href)
    {
        (captures.get(1)?, captures.get(2), captures.get(3)?)
    } else {
        let captures = regex!(r"/cfb/schools/([^/]+)/(\d{4})\.html").captures(href)?;
        (captures.get(1)?, None, captures.get(2)?)
    };
    let link_sport = match sport_part.map(|m| m.as_str()) {
        Some("men") => Sport::MensBasketball,
        Some(_) => Sport::WomensBasketball,
        None => Sport::Football,
    };
    (link_sport == sport && year.as_str().parse::<u16>().ok() == Some(season.year()))
        .then(|| slug.as_str().to_owned())
}

fn conference_of(link: ElementRef) -> String {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "tr")
        .and_then(|row| row.select(selector!(r#"td[data-stat="conf_abbr"]"#)).next())
        .map(|cell| cell.text().collect::<String>().trim().to_owned())
        .unwrap_or_default()
}

/// Lists the schools linked from a school index page, sorted by slug.
pub fn parse_school_index(html: &Html, sport: Sport, season: Season) -> Vec<School> {
    html.select(selector!("a[href]"))
        .filter_map(|link| {
            let slug = school_slug_of(link.value().attr("href")?, sport, season)?;
            let name = link.text().collect::<String>().trim().to_owned();
            Some(
                School::builder()
                    .school_slug(slug.into())
                    .school_name(name.into())
                    .conference(conference_of(link).into())
                    .build(),
            )
        })
        .unique_by(|school| school.school_slug().clone())
        .sorted_by(|x, y| x.school_slug().cmp(y.school_slug()))
        .collect()
}

/// Downloads the school index of `sport` in `season`.
pub async fn fetch_schools(
    client: &RosterClient,
    sport: Sport,
    season: Season,
) -> anyhow::Result<Vec<School>> {
    let url = client.url_for(&sport.school_index_path(season))?;
    let body = match client
        .get_page(url.clone())
        .await
        .with_context(|| format!("While fetching {url}"))?
    {
        FetchedPage::Found(body) => body,
        FetchedPage::Missing => bail!("There is no school index at {url}"),
    };
    let schools = parse_school_index(&Html::parse_document(&body), sport, season);
    info!("{} schools found for {sport} in {}", schools.len(), season.label(sport));
    Ok(schools)
}

/// Writes a school file in the layout the scraper reads.
pub fn write_schools(path: &Path, schools: &[School]) -> anyhow::Result<()> {
    (|| {
        create_parent_dir(path)?;
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for school in schools {
            writer.serialize(school)?;
        }
        writer.flush()?;
        anyhow::Ok(())
    })()
    .with_context(|| format!("While writing the school file {path:?}"))
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use roster_scraping_utils::fs_util::read_csv;
    use scraper::Html;

    use super::{parse_school_index, school_slug_of, write_schools};
    use crate::schema::{School, Season, Sport};

    const INDEX: &str = r#"
<table id="basic_school_stats">
  <tbody>
    <tr><td data-stat="school_name"><a href="/cbb/schools/ucla/men/2018.html">UCLA</a></td>
        <td data-stat="conf_abbr">Pac-12</td></tr>
    <tr><td data-stat="school_name"><a href="/cbb/schools/duke/men/2018.html">Duke</a>&nbsp;NCAA</td>
        <td data-stat="conf_abbr">ACC</td></tr>
    <tr><td data-stat="school_name"><a href="/cbb/schools/duke/men/2018.html">Duke</a></td></tr>
    <tr><td><a href="/cbb/schools/duke/women/2018.html">Duke</a></td></tr>
    <tr><td><a href="/cbb/schools/army/men/2017.html">Army</a></td></tr>
  </tbody>
</table>
<p><a href="/cbb/schools/navy/men/2018.html">Navy</a></p>
"#;

    #[test]
    fn test_school_slug_of() {
        let season = Season::new(2019);
        assert_eq!(
            school_slug_of("/cfb/schools/alabama/2019.html", Sport::Football, season),
            Some("alabama".to_owned())
        );
        assert_eq!(
            school_slug_of(
                "https://www.sports-reference.com/cbb/schools/duke/women/2019.html",
                Sport::WomensBasketball,
                season
            ),
            Some("duke".to_owned())
        );
        assert_eq!(
            school_slug_of("/cbb/schools/duke/women/2019.html", Sport::MensBasketball, season),
            None
        );
        assert_eq!(
            school_slug_of("/cfb/schools/alabama/2019-roster.html", Sport::Football, season),
            None
        );
    }

    #[test]
    fn test_parse_school_index() {
        let schools = parse_school_index(
            &Html::parse_document(INDEX),
            Sport::MensBasketball,
            Season::new(2018),
        );
        let summary = schools
            .iter()
            .map(|school| {
                format!(
                    "{}|{}|{}",
                    school.school_slug(),
                    school.school_name(),
                    school.conference()
                )
            })
            .collect_vec();
        assert_eq!(summary, ["duke|Duke|ACC", "navy|Navy|", "ucla|UCLA|Pac-12"]);
    }

    #[test]
    fn test_write_schools() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schools/mbb.csv");
        let schools = parse_school_index(
            &Html::parse_document(INDEX),
            Sport::MensBasketball,
            Season::new(2018),
        );
        write_schools(&path, &schools).unwrap();
        let text = fs_err::read_to_string(&path).unwrap();
        assert!(text.starts_with("school_slug,school_name,conference\n"));
        assert_eq!(read_csv::<_, School>(&path).unwrap(), schools);
    }
}
