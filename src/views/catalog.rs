//! Public catalog pages. Their content is static.

use std::fmt::Write;

use super::layout::escape;

pub struct Course {
    pub title: &'static str,
    pub description: &'static str,
    pub weeks: u32,
    pub instructors: u32,
    pub students: u32,
}

pub const COURSES: &[Course] = &[
    Course {
        title: "Data Structures & Algorithms",
        description: "Master fundamental DSA concepts, problem-solving techniques, and optimization strategies",
        weeks: 16,
        instructors: 4,
        students: 1200,
    },
    Course {
        title: "Computer Organization & Architecture",
        description: "Learn computer hardware organization, processor architecture, and system design",
        weeks: 14,
        instructors: 3,
        students: 850,
    },
    Course {
        title: "Database Management Systems",
        description: "Study database design, SQL, normalization, and transaction management",
        weeks: 12,
        instructors: 3,
        students: 950,
    },
    Course {
        title: "Computer Networks",
        description: "Explore networking protocols, architecture, and network security fundamentals",
        weeks: 14,
        instructors: 4,
        students: 780,
    },
    Course {
        title: "Information Security",
        description: "Learn cryptography, network security, and cybersecurity best practices",
        weeks: 12,
        instructors: 3,
        students: 650,
    },
    Course {
        title: "Operating Systems",
        description: "Study process management, memory management, and file systems",
        weeks: 15,
        instructors: 4,
        students: 890,
    },
    Course {
        title: "Theory of Computation",
        description: "Explore automata theory, formal languages, and computational complexity",
        weeks: 13,
        instructors: 3,
        students: 580,
    },
    Course {
        title: "Web Technologies",
        description: "Master modern web development with React, Node.js, and related technologies",
        weeks: 16,
        instructors: 5,
        students: 1500,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    fn label(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

pub struct PracticeTopic {
    pub title: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    pub challenges: u32,
}

pub const PRACTICE_TOPICS: &[PracticeTopic] = &[
    PracticeTopic { title: "Data Structures", description: "Practice implementing and manipulating various data structures", difficulty: Difficulty::Intermediate, challenges: 45 },
    PracticeTopic { title: "Algorithms", description: "Solve algorithmic challenges and optimize solutions", difficulty: Difficulty::Advanced, challenges: 60 },
    PracticeTopic { title: "SQL Challenges", description: "Master database queries and operations", difficulty: Difficulty::Beginner, challenges: 30 },
    PracticeTopic { title: "Problem Solving", description: "Enhance your logical thinking and problem-solving skills", difficulty: Difficulty::Intermediate, challenges: 50 },
    PracticeTopic { title: "Command Line", description: "Learn essential command line operations", difficulty: Difficulty::Beginner, challenges: 25 },
    PracticeTopic { title: "Version Control", description: "Practice Git commands and workflows", difficulty: Difficulty::Intermediate, challenges: 35 },
    PracticeTopic { title: "System Design", description: "Design scalable systems and architectures", difficulty: Difficulty::Advanced, challenges: 40 },
    PracticeTopic { title: "Debugging", description: "Find and fix bugs in code snippets", difficulty: Difficulty::Intermediate, challenges: 30 },
    PracticeTopic { title: "Operating Systems", description: "Explore OS concepts and implementations", difficulty: Difficulty::Advanced, challenges: 35 },
];

pub struct CommunitySection {
    pub title: &'static str,
    pub description: &'static str,
    pub count: u32,
}

pub const COMMUNITY_SECTIONS: &[CommunitySection] = &[
    CommunitySection { title: "Technical Blogs", description: "Share your knowledge and experiences through detailed technical articles", count: 450 },
    CommunitySection { title: "Discussion Forums", description: "Engage in discussions about programming, tech trends, and challenges", count: 1200 },
    CommunitySection { title: "Study Groups", description: "Join or create study groups for collaborative learning", count: 85 },
    CommunitySection { title: "Project Showcase", description: "Showcase your projects and get feedback from peers", count: 320 },
];

pub struct BlogPost {
    pub title: &'static str,
    pub author: &'static str,
    pub date: &'static str,
    pub category: &'static str,
}

pub const RECENT_POSTS: &[BlogPost] = &[
    BlogPost { title: "Understanding System Design: A Beginner's Guide", author: "Rahul Kumar", date: "2024-02-08", category: "System Design" },
    BlogPost { title: "Best Practices for React Performance Optimization", author: "Priya Singh", date: "2024-02-07", category: "Web Development" },
    BlogPost { title: "Introduction to Machine Learning Algorithms", author: "Alex Johnson", date: "2024-02-06", category: "Machine Learning" },
];

const FEATURES: &[(&str, &str)] = &[
    ("Learn to Code", "Start your coding journey with structured learning paths and hands-on projects."),
    ("Practice & Grow", "Strengthen your skills with coding challenges and real-world problems."),
    ("Build Projects", "Create amazing projects and build your portfolio with fellow students."),
    ("Access Resources", "Get access to curated learning materials and documentation."),
    ("Set Goals", "Track your progress and achieve your coding milestones."),
    ("Earn Certificates", "Get recognized for your achievements and skills."),
];

fn hero(title: &str, subtitle: &str, stats: &[String]) -> String {
    let mut html = format!(
        r#"<section class="hero"><h1>{}</h1><p>{}</p><div class="stats">"#,
        escape(title),
        escape(subtitle)
    );
    for stat in stats {
        let _ = write!(html, "<span>{}</span>", escape(stat));
    }
    html.push_str("</div></section>");
    html
}

pub fn home() -> String {
    let mut html = String::from(
        r#"<section class="hero"><h1>For Students,<br>By Students</h1><p>Learn, practice and build with your campus community.</p><a class="button" href="/register">Get started</a> <a class="button secondary" href="/courses">Browse courses</a></section><section class="grid">"#,
    );
    for (title, description) in FEATURES {
        let _ = write!(
            html,
            r#"<article class="card"><h3>{}</h3><p>{}</p></article>"#,
            escape(title),
            escape(description)
        );
    }
    html.push_str("</section>");
    html
}

pub fn courses() -> String {
    let instructors: u32 = COURSES.iter().map(|c| c.instructors).sum();
    let students: u32 = COURSES.iter().map(|c| c.students).sum();
    let mut html = hero(
        "Explore Our Courses",
        "Comprehensive computer science courses taught by experienced faculty",
        &[
            format!("{} Courses", COURSES.len()),
            format!("{} Instructors", instructors),
            format!("{}+ Students", students / 100 * 100),
        ],
    );
    html.push_str(r#"<section class="grid">"#);
    for course in COURSES {
        let _ = write!(
            html,
            r#"<article class="card"><h3>{}</h3><p>{}</p><ul class="meta"><li>{} weeks</li><li>{} instructors</li><li>{} students</li></ul></article>"#,
            escape(course.title),
            escape(course.description),
            course.weeks,
            course.instructors,
            course.students
        );
    }
    html.push_str("</section>");
    html
}

pub fn practice() -> String {
    let challenges: u32 = PRACTICE_TOPICS.iter().map(|t| t.challenges).sum();
    let mut html = hero(
        "Practice & Perfect Your Skills",
        "Choose from hundreds of coding challenges across different domains and difficulty levels",
        &[
            format!("{} Categories", PRACTICE_TOPICS.len()),
            format!("{}+ Challenges", challenges / 50 * 50),
        ],
    );
    html.push_str(r#"<section class="grid">"#);
    for topic in PRACTICE_TOPICS {
        let _ = write!(
            html,
            r#"<article class="card"><h3>{}</h3><p>{}</p><span class="badge badge-{}">{}</span> <span>{} challenges</span></article>"#,
            escape(topic.title),
            escape(topic.description),
            topic.difficulty.label().to_lowercase(),
            topic.difficulty.label(),
            topic.challenges
        );
    }
    html.push_str("</section>");
    html
}

pub fn community() -> String {
    let mut html = hero(
        "Join Our Community",
        "Connect, share, and grow with fellow developers",
        &["Active Discussions".to_string(), "Study Groups".to_string()],
    );
    html.push_str(r#"<section class="grid">"#);
    for section in COMMUNITY_SECTIONS {
        let _ = write!(
            html,
            r#"<article class="card"><h3>{}</h3><p>{}</p><span>{}</span></article>"#,
            escape(section.title),
            escape(section.description),
            section.count
        );
    }
    html.push_str(r#"</section><section><h2>Recent blogs</h2><ul class="posts">"#);
    for post in RECENT_POSTS {
        let _ = write!(
            html,
            r#"<li><h3>{}</h3><p>{} &middot; {} &middot; {}</p></li>"#,
            escape(post.title),
            escape(post.author),
            escape(post.date),
            escape(post.category)
        );
    }
    html.push_str("</ul></section>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_stats_are_derived_from_the_list() {
        let html = courses();
        assert!(html.contains("8 Courses"));
        assert!(html.contains("29 Instructors"));
        assert!(html.contains("7400+ Students"));
    }

    #[test]
    fn practice_lists_every_topic_with_difficulty() {
        let html = practice();
        assert!(html.contains("9 Categories"));
        assert!(html.contains("350+ Challenges"));
        assert!(html.contains(r#"badge-advanced"#));
    }

    #[test]
    fn community_escapes_titles() {
        assert!(community().contains("Beginner&#x27;s Guide"));
    }
}
