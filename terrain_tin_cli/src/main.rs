use clap::{Parser, Subcommand};
use nalgebra::Vector3;
use terrain_tin::dtm::{tin_from_raster, tin_from_raster_with_boundary};
use terrain_tin::io::{
    read_boundary_geojson, read_esri_ascii, read_landxml_surface, write_landxml_surface,
    write_tin_json,
};
use terrain_tin::raster::RasterTile;
use terrain_tin::simplify::{
    CollapseCost, EdgeCountStop, EdgeLengthCost, MidpointPlacement, QuadricCost, QuadricPlacement,
    VertexPlacement,
};
use terrain_tin::{classify, shadow, Tin};

#[derive(Parser)]
#[command(name = "terrain_tin_cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a TIN surface from an ESRI ASCII raster.
    BuildTin {
        raster: String,
        output: String,
        /// GeoJSON polygon clipping the triangulation.
        #[arg(long)]
        boundary: Option<String>,
        /// Collapse edges until fewer than this many remain.
        #[arg(long)]
        max_edges: Option<usize>,
        /// Collapse cost: quadric or length.
        #[arg(long, default_value = "quadric")]
        cost: String,
        /// Merged vertex placement: midpoint or quadric.
        #[arg(long, default_value = "midpoint")]
        placement: String,
    },
    /// Print the extents and spacing of an ESRI ASCII raster.
    RasterInfo { raster: String },
    /// List the faces of a LandXML surface in shadow for a sun direction.
    Shadow {
        surface: String,
        /// Direction sunlight travels, as x,y,z.
        #[arg(long)]
        sun: String,
    },
    /// List the near-flat faces of a LandXML surface.
    Lakes { surface: String },
    /// List avalanche-prone faces of a LandXML surface.
    Avalanche {
        surface: String,
        /// Height intervals as lo,hi[,lo,hi...].
        #[arg(long)]
        heights: String,
        /// Aspect intervals in radians as lo,hi[,lo,hi...].
        #[arg(long)]
        aspects: String,
    },
}

fn parse_vector(text: &str) -> Option<Vector3<f64>> {
    let parts: Vec<f64> = text
        .split(',')
        .filter_map(|v| v.trim().parse().ok())
        .collect();
    if parts.len() == 3 {
        Some(Vector3::new(parts[0], parts[1], parts[2]))
    } else {
        None
    }
}

fn parse_intervals(text: &str) -> Option<Vec<(f64, f64)>> {
    let values: Vec<f64> = text
        .split(',')
        .filter_map(|v| v.trim().parse().ok())
        .collect();
    if values.is_empty() || values.len() % 2 != 0 {
        return None;
    }
    Some(values.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}

fn build_surface<C, P>(
    tile: &RasterTile,
    boundary_path: Option<&str>,
    stop: &EdgeCountStop,
    cost: &C,
    placement: &P,
) -> std::io::Result<Tin>
where
    C: CollapseCost,
    P: VertexPlacement,
{
    match boundary_path {
        Some(path) => {
            let polygon = read_boundary_geojson(path)?;
            tin_from_raster_with_boundary(tile, &polygon, stop, cost, placement)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }
        None => Ok(tin_from_raster(tile, stop, cost, placement)),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::BuildTin {
            raster,
            output,
            boundary,
            max_edges,
            cost,
            placement,
        } => match read_esri_ascii(&raster) {
            Ok(tile) => {
                if cost != "quadric" && cost != "length" {
                    eprintln!("Unknown cost {}, using quadric", cost);
                }
                if placement != "midpoint" && placement != "quadric" {
                    eprintln!("Unknown placement {}, using midpoint", placement);
                }
                let stop = EdgeCountStop {
                    edges: max_edges.unwrap_or(usize::MAX),
                };
                let boundary = boundary.as_deref();
                let built = match (cost.as_str(), placement.as_str()) {
                    ("length", "quadric") => {
                        build_surface(&tile, boundary, &stop, &EdgeLengthCost, &QuadricPlacement)
                    }
                    ("length", _) => {
                        build_surface(&tile, boundary, &stop, &EdgeLengthCost, &MidpointPlacement)
                    }
                    (_, "quadric") => {
                        build_surface(&tile, boundary, &stop, &QuadricCost, &QuadricPlacement)
                    }
                    _ => build_surface(&tile, boundary, &stop, &QuadricCost, &MidpointPlacement),
                };
                match built {
                    Ok(tin) => {
                        log::debug!(
                            "built tin with {} vertices and {} faces",
                            tin.vertices.len(),
                            tin.faces.len()
                        );
                        let written = if output.ends_with(".json") {
                            write_tin_json(&output, &tin)
                        } else {
                            write_landxml_surface(&output, &tin)
                        };
                        match written {
                            Ok(()) => println!("Wrote {}", output),
                            Err(e) => eprintln!("Error writing {}: {}", output, e),
                        }
                    }
                    Err(e) => eprintln!("Error building {}: {}", raster, e),
                }
            }
            Err(e) => eprintln!("Error reading {}: {}", raster, e),
        },
        Commands::RasterInfo { raster } => match read_esri_ascii(&raster) {
            Ok(tile) => {
                println!(
                    "{} x {} nodes, spacing {} x {}",
                    tile.num_points_x, tile.num_points_y, tile.delta_x, tile.delta_y
                );
                println!(
                    "x: {} to {}, y: {} to {}",
                    tile.x_min,
                    tile.x_max(),
                    tile.y_min(),
                    tile.y_max
                );
            }
            Err(e) => eprintln!("Error reading {}: {}", raster, e),
        },
        Commands::Shadow { surface, sun } => match parse_vector(&sun) {
            Some(direction) => match read_landxml_surface(&surface) {
                Ok(tin) => {
                    let shadowed = shadow::shadow_faces(&tin, direction);
                    println!("{} of {} faces in shadow", shadowed.len(), tin.faces.len());
                    for idx in shadowed {
                        println!("{}", idx);
                    }
                }
                Err(e) => eprintln!("Error reading {}: {}", surface, e),
            },
            None => eprintln!("Invalid sun direction {}", sun),
        },
        Commands::Lakes { surface } => match read_landxml_surface(&surface) {
            Ok(tin) => {
                let (lakes, _) = classify::extract_lakes(&tin);
                println!("{} lake faces", lakes.len());
                for face in lakes {
                    println!("{} {} {}", face[0], face[1], face[2]);
                }
            }
            Err(e) => eprintln!("Error reading {}: {}", surface, e),
        },
        Commands::Avalanche {
            surface,
            heights,
            aspects,
        } => match (parse_intervals(&heights), parse_intervals(&aspects)) {
            (Some(height_intervals), Some(exposed_intervals)) => {
                match read_landxml_surface(&surface) {
                    Ok(tin) => {
                        let (exposed, _) = classify::extract_avalanche_expositions(
                            &tin,
                            &exposed_intervals,
                            &height_intervals,
                        );
                        println!("{} exposed faces", exposed.len());
                        for face in exposed {
                            println!("{} {} {}", face[0], face[1], face[2]);
                        }
                    }
                    Err(e) => eprintln!("Error reading {}: {}", surface, e),
                }
            }
            _ => eprintln!("Intervals must be comma-separated lo,hi pairs"),
        },
    }
}
